use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a bulletin into records
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Header marker found but the race-name line does not match
    #[error("line {line}: race name not found after header marker: {found:?}")]
    RaceNameNotFound { line: usize, found: String },

    /// Header marker found but the venue line does not match
    #[error("line {line}: venue not found after header marker: {found:?}")]
    VenueNotFound { line: usize, found: String },

    /// Document ended before the header block was complete
    #[error("document ends inside the header block opened at line {line}")]
    TruncatedHeader { line: usize },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no {kind} document for {date} in {dir:?}")]
    MissingDocument {
        kind: &'static str,
        date: String,
        dir: PathBuf,
    },

    /// Building or joining the record frames failed
    #[error("frame operation failed: {0}")]
    Frame(#[from] PolarsError),

    #[error("database write failed: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ExtractError {
    /// True when the document violates the bulletin layout and must be discarded
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ExtractError::RaceNameNotFound { .. }
                | ExtractError::VenueNotFound { .. }
                | ExtractError::TruncatedHeader { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
