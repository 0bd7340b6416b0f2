//! Boatrace bulletin extraction
//!
//! This library turns the fixed-layout text bulletins published for boat
//! races into tabular records:
//! - Entrant schedules (番組表) from `B` bulletins
//! - Finishing results, race conditions and payouts from `K` bulletins
//! - Daily tables joining results with schedules and conditions
//! - Archive download and unpacking, CSV output and an SQLite store
//!
//! # Example
//!
//! ```no_run
//! use boatrace_extract::{parse_document, DirectorySource, DocumentKind, Grammar, RecordKind, SourceProvider};
//! use chrono::NaiveDate;
//!
//! let grammar = Grammar::new();
//! let source = DirectorySource::new("data");
//! let date = NaiveDate::from_ymd_opt(2020, 9, 15).unwrap();
//! let doc = source.document(date, DocumentKind::Result).unwrap();
//!
//! let results = parse_document(&grammar, RecordKind::Result, &doc).unwrap();
//! println!("{} result rows", results.records.len());
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod grammar;
pub mod merge;
pub mod odds;
pub mod pipeline;
pub mod records;
pub mod scanner;
pub mod sink;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use config::{DateRange, PipelineConfig};
pub use driver::{parse_document, DocumentParser, Extraction};
pub use error::{ExtractError, Result};
pub use fetch::{ArchiveFetcher, FetchConfig, FetchError, FetchOutcome};
pub use grammar::{DocumentKind, Grammar, RecordKind};
pub use merge::{merge_race_tables, records_frame};
pub use odds::Diagnostic;
pub use pipeline::{build_day, extract_day, write_day, DayOutput, DayTables, DocumentTable};
pub use records::{BetType, Payout, Record};
pub use scanner::RaceId;
pub use sink::{CsvSink, JsonLinesSink, RecordSink};
pub use source::{DirectorySource, Document, SourceProvider};
pub use store::RaceStore;
