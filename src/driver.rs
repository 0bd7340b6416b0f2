//! One full extraction pass over a document

use tracing::{debug, info};

use crate::error::Result;
use crate::extract::RecordExtractor;
use crate::grammar::{Grammar, RecordKind};
use crate::odds::Diagnostic;
use crate::records::Record;
use crate::scanner::{LineCursor, LineScanner, ScannerEvent};
use crate::source::Document;

/// Records of one kind extracted from one document, in line order
#[derive(Debug, Clone)]
pub struct Extraction {
    pub kind: RecordKind,
    pub records: Vec<Record>,
    /// Odds fields that could not be detected
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Drives the scanner and extractor over a document for one record kind
pub struct DocumentParser<'g> {
    grammar: &'g Grammar,
    kind: RecordKind,
}

impl<'g> DocumentParser<'g> {
    pub fn new(grammar: &'g Grammar, kind: RecordKind) -> Self {
        Self { grammar, kind }
    }

    /// Extract every record of this parser's kind from `doc`
    ///
    /// A structural error aborts the whole document; no partial records are
    /// returned. A fresh race context is used for every call.
    pub fn parse(&self, doc: &Document) -> Result<Extraction> {
        if doc.kind != self.kind.document_kind() {
            debug!(
                "{} holds no {} records ({} bulletin)",
                doc.name,
                self.kind,
                doc.kind.name()
            );
        }

        let mut scanner = LineScanner::new(self.grammar, self.kind.document_kind());
        let extractor = RecordExtractor::new(self.grammar, self.kind);
        let mut cursor = LineCursor::new(&doc.lines);
        let mut records = Vec::new();
        let mut diagnostics = Vec::new();

        while let Some(line) = cursor.advance() {
            let line = match scanner.on_line(line, &mut cursor)? {
                ScannerEvent::Round(line) | ScannerEvent::Data(line) => line,
                ScannerEvent::Header | ScannerEvent::Other => continue,
            };
            let Some(race) = scanner.context() else {
                continue;
            };
            if let Some(record) =
                extractor.extract(line, race, &doc.date, &mut cursor, &mut diagnostics)
            {
                records.push(record);
            }
        }

        info!(
            "{}: {} {} records ({} undetected fields)",
            doc.name,
            records.len(),
            self.kind,
            diagnostics.len()
        );

        Ok(Extraction {
            kind: self.kind,
            records,
            diagnostics,
        })
    }
}

/// Convenience wrapper for a single pass
pub fn parse_document(grammar: &Grammar, kind: RecordKind, doc: &Document) -> Result<Extraction> {
    DocumentParser::new(grammar, kind).parse(doc)
}
