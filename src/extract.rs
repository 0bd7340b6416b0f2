//! Record extraction for a single scanned line

use regex::Captures;

use crate::grammar::{Grammar, RecordKind};
use crate::odds::{Diagnostic, OddsParser};
use crate::records::{EnvironmentRecord, Record, ResultRecord, ScheduleRecord};
use crate::scanner::{LineCursor, RaceContext};

/// Applies the grammar of one record kind to data lines
pub struct RecordExtractor<'g> {
    grammar: &'g Grammar,
    kind: RecordKind,
    odds: OddsParser<'g>,
}

impl<'g> RecordExtractor<'g> {
    pub fn new(grammar: &'g Grammar, kind: RecordKind) -> Self {
        Self {
            grammar,
            kind,
            odds: OddsParser::new(grammar),
        }
    }

    /// Try to build a record from `line`
    ///
    /// Returns `None` for lines that are not data lines of this kind. Odds
    /// blocks span several lines, which are pulled from `cursor`.
    pub fn extract<'a>(
        &self,
        line: &'a str,
        race: &RaceContext,
        date: &str,
        cursor: &mut LineCursor<'a>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Record> {
        match self.kind {
            RecordKind::Schedule => self
                .grammar
                .schedule_entry()
                .captures(line)
                .and_then(|caps| schedule_record(&caps, race, date))
                .map(Record::Schedule),
            RecordKind::Result => self
                .grammar
                .result_entry()
                .captures(line)
                .and_then(|caps| result_record(&caps, race, date))
                .map(Record::Result),
            RecordKind::Environment => self
                .grammar
                .environment_entry()
                .captures(line)
                .map(|caps| Record::Environment(environment_record(&caps, race, date))),
            RecordKind::Odds => {
                if !self.grammar.is_odds_opener(line) {
                    return None;
                }
                let race_id = race.race_id(date);
                Some(Record::Odds(
                    self.odds.parse_group(line, race_id, cursor, diagnostics),
                ))
            }
        }
    }
}

fn text(caps: &Captures<'_>, group: usize) -> String {
    caps.get(group).map_or_else(String::new, |m| m.as_str().to_string())
}

fn schedule_record(caps: &Captures<'_>, race: &RaceContext, date: &str) -> Option<ScheduleRecord> {
    Some(ScheduleRecord {
        race_id: race.race_id(date),
        lane: caps.get(1)?.as_str().parse().ok()?,
        racer_id: text(caps, 2),
        name: text(caps, 3),
        age: text(caps, 4),
        branch: text(caps, 5),
        weight: text(caps, 6),
        class: text(caps, 7),
        national_win_rate: text(caps, 8),
        national_in2_rate: text(caps, 9),
        local_win_rate: text(caps, 10),
        local_in2_rate: text(caps, 11),
        motor_in2_rate: text(caps, 12),
        boat_in2_rate: text(caps, 13),
    })
}

fn result_record(caps: &Captures<'_>, race: &RaceContext, date: &str) -> Option<ResultRecord> {
    Some(ResultRecord {
        race_id: race.race_id(date),
        rank: caps.get(1)?.as_str().parse().ok()?,
        racer_id: text(caps, 2),
        exhibition_time: text(caps, 3),
    })
}

fn environment_record(caps: &Captures<'_>, race: &RaceContext, date: &str) -> EnvironmentRecord {
    EnvironmentRecord {
        race_id: race.race_id(date),
        weather: text(caps, 1),
        wind_direction: text(caps, 2),
        wind_speed: text(caps, 3),
        wave_height: text(caps, 4),
        venue: race.venue.clone(),
    }
}
