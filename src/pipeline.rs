//! Daily table building: extract both bulletins of a day, merge, write
//!
//! For one race day this reads the result (`K`) and schedule (`B`) bulletins,
//! joins results with schedules and race conditions into one frame, and
//! optionally extracts the odds frame from the result bulletin.

use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PipelineConfig;
use crate::driver::{parse_document, Extraction};
use crate::error::{ExtractError, Result};
use crate::grammar::{DocumentKind, Grammar, RecordKind};
use crate::merge::{merge_race_tables, records_frame};
use crate::odds::Diagnostic;
use crate::sink::output_name;
use crate::source::{format_date, Document, SourceProvider};
use crate::store::RaceStore;

/// Records of one kind from one bulletin
#[derive(Debug, Clone)]
pub struct DocumentTable {
    pub kind: RecordKind,
    /// Output file name, e.g. `K200915.CSV`
    pub file_name: String,
    pub frame: DataFrame,
}

/// Everything extracted for one race day
#[derive(Debug, Clone)]
pub struct DayTables {
    pub date: NaiveDate,
    /// Results joined with schedules and conditions
    pub entries: DataFrame,
    pub odds: Option<DataFrame>,
    pub documents: Vec<DocumentTable>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Files written for one race day
#[derive(Debug, Clone, Default)]
pub struct DayOutput {
    pub entries_path: Option<PathBuf>,
    pub odds_path: Option<PathBuf>,
    pub entry_rows: usize,
    pub odds_rows: usize,
}

fn extract(grammar: &Grammar, kind: RecordKind, doc: &Document) -> Result<(DocumentTable, Extraction)> {
    let extraction = parse_document(grammar, kind, doc)?;
    let table = DocumentTable {
        kind,
        file_name: output_name(&doc.name, kind),
        frame: records_frame(kind, &extraction.records)?,
    };
    Ok((table, extraction))
}

/// Extract and merge the tables of one day
pub fn extract_day<S: SourceProvider>(
    grammar: &Grammar,
    source: &S,
    date: NaiveDate,
    with_odds: bool,
) -> Result<DayTables> {
    let results_doc = source.document(date, DocumentKind::Result)?;
    let schedule_doc = source.document(date, DocumentKind::Schedule)?;

    let (results, _) = extract(grammar, RecordKind::Result, &results_doc)?;
    let (schedules, _) = extract(grammar, RecordKind::Schedule, &schedule_doc)?;
    let (environment, _) = extract(grammar, RecordKind::Environment, &results_doc)?;

    let entries = merge_race_tables(&results.frame, &schedules.frame, Some(&environment.frame))?;

    let mut documents = vec![results, schedules, environment];
    let mut diagnostics = Vec::new();
    let mut odds = None;
    if with_odds {
        let (table, extraction) = extract(grammar, RecordKind::Odds, &results_doc)?;
        diagnostics = extraction.diagnostics;
        odds = Some(table.frame.clone());
        documents.push(table);
    }

    Ok(DayTables {
        date,
        entries,
        odds,
        documents,
        diagnostics,
    })
}

fn write_frame(path: &Path, frame: &DataFrame) -> Result<usize> {
    let mut file = File::create(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut frame = frame.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(frame.height())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| ExtractError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write the tables of one day under the configured directories
pub fn write_day(config: &PipelineConfig, day: &DayTables) -> Result<DayOutput> {
    let stem = format_date(day.date);
    let mut output = DayOutput::default();

    ensure_dir(&config.table_dir)?;
    let entries_path = config.table_dir.join(format!("{stem}.csv"));
    output.entry_rows = write_frame(&entries_path, &day.entries)?;
    output.entries_path = Some(entries_path);

    if let Some(odds) = &day.odds {
        ensure_dir(&config.odds_dir)?;
        let odds_path = config.odds_dir.join(format!("{stem}.csv"));
        output.odds_rows = write_frame(&odds_path, odds)?;
        output.odds_path = Some(odds_path);
    }

    if config.keep_intermediate {
        for document in &day.documents {
            write_frame(&config.table_dir.join(&document.file_name), &document.frame)?;
        }
    }

    info!(
        "{}: {} entries, {} odds rows",
        stem, output.entry_rows, output.odds_rows
    );
    Ok(output)
}

/// Extract, merge and write one day, optionally storing it in the database
pub fn build_day<S: SourceProvider>(
    grammar: &Grammar,
    source: &S,
    config: &PipelineConfig,
    date: NaiveDate,
    store: Option<&mut RaceStore>,
) -> Result<DayOutput> {
    let day = extract_day(grammar, source, date, config.with_odds)?;
    let output = write_day(config, &day)?;
    if let Some(store) = store {
        store.write_day(&day)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DirectorySource;
    use encoding_rs::SHIFT_JIS;

    const RESULT_DOC: &str = include_str!("../tests/fixtures/K200915.txt");
    const SCHEDULE_DOC: &str = include_str!("../tests/fixtures/B200915.txt");

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 9, 15).unwrap()
    }

    fn write_cp932(dir: &Path, name: &str, text: &str) {
        let (encoded, _, _) = SHIFT_JIS.encode(text);
        fs::write(dir.join(name), encoded).unwrap();
    }

    fn input_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_cp932(dir.path(), "K200915.TXT", RESULT_DOC);
        write_cp932(dir.path(), "B200915.TXT", SCHEDULE_DOC);
        dir
    }

    fn strings(frame: &DataFrame, name: &str) -> Vec<String> {
        frame
            .column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_extract_day_merges_tables() {
        let input = input_dir();
        let grammar = Grammar::new();
        let source = DirectorySource::new(input.path());

        let day = extract_day(&grammar, &source, date(), true).unwrap();

        // Only the 戸田 block appears in both bulletins
        assert_eq!(day.entries.height(), 2);
        assert_eq!(strings(&day.entries, "racer_id"), vec!["4321", "4322"]);
        assert_eq!(strings(&day.entries, "lane"), vec!["3", "1"]);
        assert_eq!(strings(&day.entries, "weather"), vec!["雨", "雨"]);

        assert_eq!(day.odds.as_ref().map(DataFrame::height), Some(3));
        assert_eq!(day.diagnostics.len(), 1);
        let names: Vec<&str> = day.documents.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["K200915.CSV", "B200915.CSV", "E200915.CSV", "O200915.CSV"]);
    }

    #[test]
    fn test_extract_day_without_odds() {
        let input = input_dir();
        let grammar = Grammar::new();
        let source = DirectorySource::new(input.path());

        let day = extract_day(&grammar, &source, date(), false).unwrap();
        assert!(day.odds.is_none());
        assert_eq!(day.documents.len(), 3);
    }

    #[test]
    fn test_build_day_writes_files() {
        let input = input_dir();
        let output = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            input_dir: input.path().to_path_buf(),
            table_dir: output.path().join("table"),
            odds_dir: output.path().join("odds"),
            keep_intermediate: true,
            with_odds: true,
        };
        let grammar = Grammar::new();
        let source = DirectorySource::new(&config.input_dir);

        let written = build_day(&grammar, &source, &config, date(), None).unwrap();
        assert_eq!(written.entry_rows, 2);
        assert_eq!(written.odds_rows, 3);

        let odds = fs::read_to_string(config.odds_dir.join("2020-09-15.csv")).unwrap();
        assert_eq!(odds.lines().count(), 4);
        assert!(odds.starts_with("race_id,win,place_1,place_2"));

        let entries = fs::read_to_string(config.table_dir.join("2020-09-15.csv")).unwrap();
        assert_eq!(entries.lines().count(), 3);
        assert!(entries.contains("2020-09-15戸田一般競走1R"));

        assert!(config.table_dir.join("K200915.CSV").is_file());
        assert!(config.table_dir.join("B200915.CSV").is_file());
        assert!(config.table_dir.join("O200915.CSV").is_file());
    }

    #[test]
    fn test_build_day_stores_tables() {
        let input = input_dir();
        let output = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            input_dir: input.path().to_path_buf(),
            table_dir: output.path().join("table"),
            odds_dir: output.path().join("odds"),
            ..PipelineConfig::default()
        };
        let grammar = Grammar::new();
        let source = DirectorySource::new(&config.input_dir);
        let mut store = RaceStore::open_in_memory().unwrap();

        build_day(&grammar, &source, &config, date(), Some(&mut store)).unwrap();
        assert_eq!(store.row_count("race").unwrap(), 2);
        assert_eq!(store.row_count("odds").unwrap(), 3);
    }

    #[test]
    fn test_missing_schedule_fails_day() {
        let dir = tempfile::tempdir().unwrap();
        write_cp932(dir.path(), "K200915.TXT", RESULT_DOC);
        let grammar = Grammar::new();
        let source = DirectorySource::new(dir.path());

        let err = extract_day(&grammar, &source, date(), true).unwrap_err();
        assert!(matches!(err, ExtractError::MissingDocument { kind: "schedule", .. }));
    }
}
