//! Pipeline configuration and date ranges

use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;

/// Default directory for merged daily tables
pub const DEFAULT_TABLE_DIR: &str = "table";
/// Default directory for daily odds tables
pub const DEFAULT_ODDS_DIR: &str = "odds";

/// Where bulletins are read from and tables are written to
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding extracted `K*.TXT` / `B*.TXT` members
    pub input_dir: PathBuf,
    pub table_dir: PathBuf,
    pub odds_dir: PathBuf,
    /// Also write the per-document CSV files next to the merged tables
    pub keep_intermediate: bool,
    pub with_odds: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            table_dir: PathBuf::from(DEFAULT_TABLE_DIR),
            odds_dir: PathBuf::from(DEFAULT_ODDS_DIR),
            keep_intermediate: false,
            with_odds: true,
        }
    }
}

/// Inclusive range of race days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err(format!("range end {end} is before start {start}"));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Every day of a calendar month
    pub fn month(year: i32, month: u32) -> Result<Self, String> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| format!("invalid month {year}-{month:02}"))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| format!("invalid month {year}-{month:02}"))?;

        let end = next
            .pred_opt()
            .ok_or_else(|| format!("invalid month {year}-{month:02}"))?;

        Ok(Self { start, end })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

/// Parse `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date {s:?}: {e}"))
}

/// Parse `YYYY-MM` into the range of that month
pub fn parse_month(s: &str) -> Result<DateRange, String> {
    let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|e| format!("invalid month {s:?}: {e}"))?;
    DateRange::month(date.year(), date.month())
}
