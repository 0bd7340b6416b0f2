//! Record sinks: CSV files and JSON lines

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::grammar::RecordKind;
use crate::records::{header, Record};

/// Accepts the ordered records of one kind
pub trait RecordSink {
    fn accept(&mut self, kind: RecordKind, records: &[Record]) -> io::Result<()>;
}

/// Quote a CSV field if it contains a delimiter, quote or line break
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Comma-separated writer with a header row
pub struct CsvSink<W: Write> {
    writer: W,
    rows_written: usize,
}

impl CsvSink<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            rows_written: 0,
        }
    }

    /// Data rows written so far (headers excluded)
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn write_line<S: AsRef<str>>(&mut self, fields: &[S]) -> io::Result<()> {
        let line: Vec<Cow<'_, str>> = fields.iter().map(|f| escape_field(f.as_ref())).collect();
        writeln!(self.writer, "{}", line.join(","))
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn accept(&mut self, kind: RecordKind, records: &[Record]) -> io::Result<()> {
        self.write_line(header(kind))?;
        for record in records.iter().filter(|r| r.kind() == kind) {
            self.write_line(record.row().as_slice())?;
            self.rows_written += 1;
        }
        self.writer.flush()
    }
}

/// One JSON object per record
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn accept(&mut self, kind: RecordKind, records: &[Record]) -> io::Result<()> {
        for record in records.iter().filter(|r| r.kind() == kind) {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

/// Output file name for records parsed from `source_name`
///
/// `K200915.TXT` becomes `K200915.CSV` for results, `O200915.CSV` for odds
/// and `E200915.CSV` for race conditions.
pub fn output_name(source_name: &str, kind: RecordKind) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());

    let stem = match kind {
        RecordKind::Odds => replace_kind_letter(&stem, 'O'),
        RecordKind::Environment => replace_kind_letter(&stem, 'E'),
        RecordKind::Schedule | RecordKind::Result => stem,
    };
    format!("{stem}.CSV")
}

fn replace_kind_letter(stem: &str, letter: char) -> String {
    let mut chars = stem.chars();
    match chars.next() {
        Some('K' | 'k') => std::iter::once(letter).chain(chars).collect(),
        _ => format!("{letter}{stem}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{OddsRecord, ResultRecord};
    use crate::scanner::RaceId;

    fn records() -> Vec<Record> {
        let race_id = RaceId::new("2020-09-15", "戸田", "一般戦", 1);
        vec![
            Record::Result(ResultRecord {
                race_id: race_id.clone(),
                rank: 1,
                racer_id: "4041".to_string(),
                exhibition_time: "6.77".to_string(),
            }),
            Record::Odds(OddsRecord::undetected(race_id)),
        ]
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("戸田"), "戸田");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new());
        sink.accept(RecordKind::Result, &records()).unwrap();
        assert_eq!(sink.rows_written(), 1);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "race_id,rank,racer_id,exhibition_time\n2020-09-15戸田一般戦1R,1,4041,6.77\n"
        );
    }

    #[test]
    fn test_csv_sink_odds_sentinels() {
        let mut sink = CsvSink::new(Vec::new());
        sink.accept(RecordKind::Odds, &records()).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("race_id,win,place_1,place_2"));
        assert!(lines[1].ends_with(",-1,-1,-1,-1,-1,-1,-1,-1,-1,-1"));
    }

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.accept(RecordKind::Result, &records()).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["racer_id"], "4041");
        assert_eq!(value["rank"], 1);
    }

    #[test]
    fn test_csv_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("K200915.CSV");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.accept(RecordKind::Result, &records()).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("4041"));
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("K200915.TXT", RecordKind::Result), "K200915.CSV");
        assert_eq!(output_name("B200915.TXT", RecordKind::Schedule), "B200915.CSV");
        assert_eq!(output_name("K200915.TXT", RecordKind::Odds), "O200915.CSV");
        assert_eq!(output_name("k200915.txt", RecordKind::Environment), "E200915.CSV");
    }
}
