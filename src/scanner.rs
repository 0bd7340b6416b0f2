//! Stateful line scanner that tracks which race block a line belongs to

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::grammar::{DocumentKind, Grammar, RACE_NAME_OFFSET, VENUE_OFFSET};

/// Suffix closing every race identifier
pub const RACE_ID_SUFFIX: &str = "R";

/// Pull-based cursor over the lines of one document
///
/// Lookahead consumption (header blocks, odds groups) goes through the same
/// cursor as the main loop, so consumed lines are never scanned twice.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
    lines: &'a [String],
    pos: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Self { lines, pos: 0 }
    }

    /// Next line without consuming it
    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).map(String::as_str)
    }

    /// Consume and return the next line
    pub fn advance(&mut self) -> Option<&'a str> {
        let line = self.peek()?;
        self.pos += 1;
        Some(line)
    }

    /// 1-based number of the most recently consumed line (0 before the first)
    pub fn line_no(&self) -> usize {
        self.pos
    }
}

/// Derived key joining every record kind of one race
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RaceId(String);

impl RaceId {
    pub fn new(date: &str, venue: &str, race_name: &str, round: u32) -> Self {
        Self(format!("{date}{venue}{race_name}{round}{RACE_ID_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Race metadata of the block currently being scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceContext {
    pub race_name: String,
    pub venue: String,
    pub round: u32,
}

impl RaceContext {
    pub fn race_id(&self, date: &str) -> RaceId {
        RaceId::new(date, &self.venue, &self.race_name, self.round)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    AwaitingHeader,
    InRaceBlock(RaceContext),
}

/// Classification of one scanned line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerEvent<'a> {
    /// A header block was consumed and the race context replaced
    Header,
    /// Course-length marker; the round counter was advanced
    Round(&'a str),
    /// Any other line inside a race block
    Data(&'a str),
    /// Line seen before the first header block
    Other,
}

/// Tracks the race context while a document is read top to bottom
#[derive(Debug)]
pub struct LineScanner<'g> {
    grammar: &'g Grammar,
    kind: DocumentKind,
    state: ScanState,
}

impl<'g> LineScanner<'g> {
    pub fn new(grammar: &'g Grammar, kind: DocumentKind) -> Self {
        Self {
            grammar,
            kind,
            state: ScanState::AwaitingHeader,
        }
    }

    /// Current race context, `None` until the first header block
    pub fn context(&self) -> Option<&RaceContext> {
        match &self.state {
            ScanState::AwaitingHeader => None,
            ScanState::InRaceBlock(ctx) => Some(ctx),
        }
    }

    /// Classify `line`, the line most recently taken from `cursor`
    ///
    /// A header marker pulls the race-name and venue lines from the cursor.
    /// If either does not match, the document layout is broken and the error
    /// is returned instead of keeping a stale context.
    pub fn on_line<'a>(
        &mut self,
        line: &'a str,
        cursor: &mut LineCursor<'a>,
    ) -> Result<ScannerEvent<'a>> {
        if self.grammar.is_header(self.kind, line) {
            let context = self.read_header(cursor)?;
            debug!(
                "race block at line {}: {} / {}",
                cursor.line_no(),
                context.venue,
                context.race_name
            );
            self.state = ScanState::InRaceBlock(context);
            return Ok(ScannerEvent::Header);
        }

        match &mut self.state {
            ScanState::AwaitingHeader => Ok(ScannerEvent::Other),
            ScanState::InRaceBlock(ctx) => {
                if self.grammar.is_round_marker(line) {
                    ctx.round += 1;
                    Ok(ScannerEvent::Round(line))
                } else {
                    Ok(ScannerEvent::Data(line))
                }
            }
        }
    }

    fn read_header(&self, cursor: &mut LineCursor<'_>) -> Result<RaceContext> {
        let header_line = cursor.line_no();

        let name_line = skip_lines(cursor, RACE_NAME_OFFSET, header_line)?;
        let race_name = self
            .grammar
            .race_name(name_line)
            .ok_or_else(|| ExtractError::RaceNameNotFound {
                line: cursor.line_no(),
                found: name_line.to_string(),
            })?
            .to_string();

        let venue_line = skip_lines(cursor, VENUE_OFFSET, header_line)?;
        let venue = self
            .grammar
            .venue(venue_line)
            .ok_or_else(|| ExtractError::VenueNotFound {
                line: cursor.line_no(),
                found: venue_line.to_string(),
            })?
            .to_string();

        Ok(RaceContext {
            race_name,
            venue,
            round: 0,
        })
    }
}

/// Consume `count` lines and return the last one
fn skip_lines<'a>(cursor: &mut LineCursor<'a>, count: usize, header_line: usize) -> Result<&'a str> {
    let mut last = None;
    for _ in 0..count {
        last = cursor.advance();
    }
    last.ok_or(ExtractError::TruncatedHeader { line: header_line })
}
