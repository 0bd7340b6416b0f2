//! Record frames and the joins that combine extracted record kinds
//!
//! Results and schedules share `race_id` + `racer_id`; environment rows are
//! keyed by `race_id` alone.

use polars::prelude::*;

use crate::grammar::RecordKind;
use crate::records::{header, Record};

pub const RACE_ID: &str = "race_id";
pub const RACER_ID: &str = "racer_id";

/// Temporary column used to restore result order after the joins
const ROW_INDEX: &str = "__row";

/// Frame of one record kind with one string column per header field
///
/// Records of other kinds are skipped.
pub fn records_frame(kind: RecordKind, records: &[Record]) -> PolarsResult<DataFrame> {
    let names = header(kind);
    let mut values: Vec<Vec<String>> = vec![Vec::new(); names.len()];

    for record in records.iter().filter(|r| r.kind() == kind) {
        for (column, value) in values.iter_mut().zip(record.row()) {
            column.push(value);
        }
    }

    let columns = names
        .iter()
        .zip(values)
        .map(|(name, column)| Series::new((*name).into(), column).into_column())
        .collect();
    DataFrame::new(columns)
}

/// Results joined with schedules per racer, then with race conditions
///
/// Rows keep the order of `results`; result rows without a matching
/// schedule entry (or race conditions, when given) are dropped.
pub fn merge_race_tables(
    results: &DataFrame,
    schedules: &DataFrame,
    environment: Option<&DataFrame>,
) -> PolarsResult<DataFrame> {
    let entry_keys = [col(RACE_ID), col(RACER_ID)];
    let mut merged = results
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .join(
            schedules.clone().lazy(),
            entry_keys.clone(),
            entry_keys,
            JoinArgs::new(JoinType::Inner),
        );

    if let Some(env) = environment {
        merged = merged.join(
            env.clone().lazy(),
            [col(RACE_ID)],
            [col(RACE_ID)],
            JoinArgs::new(JoinType::Inner),
        );
    }

    merged
        .sort(
            [ROW_INDEX],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?
        .drop(ROW_INDEX)
}
