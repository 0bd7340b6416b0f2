//! SQLite store for daily tables
//!
//! Tables:
//! - race: results joined with schedules and race conditions
//! - result, schedule, env: per-bulletin records
//! - odds: payouts, `-1` where undetected
//!
//! Tables are created from the frame columns on first write. Writing a day
//! again replaces the rows of that day.

use polars::prelude::*;
use rusqlite::{params_from_iter, Connection, Transaction};
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::grammar::RecordKind;
use crate::pipeline::DayTables;
use crate::records::BetType;
use crate::source::format_date;

pub const RACE_TABLE: &str = "race";
pub const ODDS_TABLE: &str = "odds";

/// Table name for per-bulletin records
pub fn table_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Schedule => "schedule",
        RecordKind::Result => "result",
        RecordKind::Environment => "env",
        RecordKind::Odds => ODDS_TABLE,
    }
}

fn column_type(name: &str) -> &'static str {
    let integer = matches!(name, "rank" | "lane")
        || BetType::ALL.iter().any(|bet| bet.label() == name);
    if integer {
        "INTEGER"
    } else {
        "TEXT"
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct RaceStore {
    conn: Connection,
}

impl RaceStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Replace the rows of `day` in every table
    pub fn write_day(&mut self, day: &DayTables) -> Result<usize> {
        let date = format_date(day.date);
        let tx = self.conn.transaction()?;

        let mut rows = replace_rows(&tx, RACE_TABLE, &date, &day.entries)?;
        for document in &day.documents {
            rows += replace_rows(&tx, table_name(document.kind), &date, &document.frame)?;
        }

        tx.commit()?;
        debug!("{}: stored {} rows", date, rows);
        Ok(rows)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn replace_rows(tx: &Transaction<'_>, table: &str, date: &str, frame: &DataFrame) -> Result<usize> {
    let names: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let table = quote(table);

    let definitions: Vec<String> = names
        .iter()
        .map(|n| format!("{} {}", quote(n), column_type(n)))
        .collect();
    tx.execute(
        &format!("CREATE TABLE IF NOT EXISTS {} ({})", table, definitions.join(", ")),
        [],
    )?;
    tx.execute(
        &format!("DELETE FROM {} WHERE race_id LIKE ?1", table),
        [format!("{date}%")],
    )?;

    let columns: Vec<String> = names.iter().map(|n| quote(n)).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let mut insert = tx.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    ))?;

    let values = names
        .iter()
        .map(|n| frame.column(n).and_then(|c| c.str()))
        .collect::<PolarsResult<Vec<_>>>()?;
    for row in 0..frame.height() {
        insert.execute(params_from_iter(values.iter().map(|c| c.get(row))))?;
    }

    Ok(frame.height())
}
