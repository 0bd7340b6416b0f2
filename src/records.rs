//! Extracted record types and their tabular layout

use serde::{Serialize, Serializer};
use std::fmt;

use crate::grammar::RecordKind;
use crate::scanner::RaceId;

/// Bet types of the odds block, in bulletin order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BetType {
    Win,
    Place1,
    Place2,
    Exacta,
    Quinella,
    Wide1,
    Wide2,
    Wide3,
    Trifecta,
    Trio,
}

impl BetType {
    pub const ALL: [BetType; 10] = [
        BetType::Win,
        BetType::Place1,
        BetType::Place2,
        BetType::Exacta,
        BetType::Quinella,
        BetType::Wide1,
        BetType::Wide2,
        BetType::Wide3,
        BetType::Trifecta,
        BetType::Trio,
    ];

    /// Column label
    pub fn label(self) -> &'static str {
        match self {
            BetType::Win => "win",
            BetType::Place1 => "place_1",
            BetType::Place2 => "place_2",
            BetType::Exacta => "exacta",
            BetType::Quinella => "quinella",
            BetType::Wide1 => "wide_1",
            BetType::Wide2 => "wide_2",
            BetType::Wide3 => "wide_3",
            BetType::Trifecta => "trifecta",
            BetType::Trio => "trio",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A payout field that may not have been found in the bulletin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Payout {
    Amount(u32),
    /// Void race or the sub-pattern did not match
    #[default]
    Undetected,
}

impl Payout {
    /// Sentinel used by the tabular output for [`Payout::Undetected`]
    pub const SENTINEL: i64 = -1;

    pub fn as_i64(self) -> i64 {
        match self {
            Payout::Amount(amount) => i64::from(amount),
            Payout::Undetected => Self::SENTINEL,
        }
    }

    pub fn is_detected(self) -> bool {
        matches!(self, Payout::Amount(_))
    }
}

impl fmt::Display for Payout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

impl Serialize for Payout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

/// One entrant line of the schedule bulletin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRecord {
    pub race_id: RaceId,
    pub lane: u8,
    pub racer_id: String,
    pub name: String,
    pub age: String,
    pub branch: String,
    pub weight: String,
    pub class: String,
    pub national_win_rate: String,
    pub national_in2_rate: String,
    pub local_win_rate: String,
    pub local_in2_rate: String,
    pub motor_in2_rate: String,
    pub boat_in2_rate: String,
}

/// One finisher line of the result bulletin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub race_id: RaceId,
    pub rank: u8,
    pub racer_id: String,
    pub exhibition_time: String,
}

/// Weather and water conditions of one race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentRecord {
    pub race_id: RaceId,
    pub weather: String,
    pub wind_direction: String,
    pub wind_speed: String,
    pub wave_height: String,
    pub venue: String,
}

/// Payouts of one race
#[derive(Debug, Clone, PartialEq)]
pub struct OddsRecord {
    pub race_id: RaceId,
    pub payouts: [Payout; 10],
}

impl OddsRecord {
    /// Record with every payout undetected, as emitted for races not held
    pub fn undetected(race_id: RaceId) -> Self {
        Self {
            race_id,
            payouts: [Payout::Undetected; 10],
        }
    }

    pub fn get(&self, bet: BetType) -> Payout {
        self.payouts[bet.index()]
    }

    pub fn set(&mut self, bet: BetType, payout: Payout) {
        self.payouts[bet.index()] = payout;
    }

    pub fn detected_count(&self) -> usize {
        self.payouts.iter().filter(|p| p.is_detected()).count()
    }
}

impl Serialize for OddsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(1 + self.payouts.len()))?;
        map.serialize_entry("race_id", &self.race_id)?;
        for bet in BetType::ALL {
            map.serialize_entry(bet.label(), &self.get(bet))?;
        }
        map.end()
    }
}

/// Any extracted record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Schedule(ScheduleRecord),
    Result(ResultRecord),
    Environment(EnvironmentRecord),
    Odds(OddsRecord),
}

const SCHEDULE_HEADER: &[&str] = &[
    "race_id",
    "lane",
    "racer_id",
    "name",
    "age",
    "branch",
    "weight",
    "class",
    "national_win_rate",
    "national_in2_rate",
    "local_win_rate",
    "local_in2_rate",
    "motor_in2_rate",
    "boat_in2_rate",
];

const RESULT_HEADER: &[&str] = &["race_id", "rank", "racer_id", "exhibition_time"];

const ENVIRONMENT_HEADER: &[&str] = &[
    "race_id",
    "weather",
    "wind_direction",
    "wind_speed",
    "wave_height",
    "venue",
];

const ODDS_HEADER: &[&str] = &[
    "race_id", "win", "place_1", "place_2", "exacta", "quinella", "wide_1", "wide_2", "wide_3",
    "trifecta", "trio",
];

/// Column names for a record kind, matching [`Record::row`]
pub fn header(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Schedule => SCHEDULE_HEADER,
        RecordKind::Result => RESULT_HEADER,
        RecordKind::Environment => ENVIRONMENT_HEADER,
        RecordKind::Odds => ODDS_HEADER,
    }
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Schedule(_) => RecordKind::Schedule,
            Record::Result(_) => RecordKind::Result,
            Record::Environment(_) => RecordKind::Environment,
            Record::Odds(_) => RecordKind::Odds,
        }
    }

    pub fn race_id(&self) -> &RaceId {
        match self {
            Record::Schedule(r) => &r.race_id,
            Record::Result(r) => &r.race_id,
            Record::Environment(r) => &r.race_id,
            Record::Odds(r) => &r.race_id,
        }
    }

    /// Field values in [`header`] order
    pub fn row(&self) -> Vec<String> {
        match self {
            Record::Schedule(r) => vec![
                r.race_id.to_string(),
                r.lane.to_string(),
                r.racer_id.clone(),
                r.name.clone(),
                r.age.clone(),
                r.branch.clone(),
                r.weight.clone(),
                r.class.clone(),
                r.national_win_rate.clone(),
                r.national_in2_rate.clone(),
                r.local_win_rate.clone(),
                r.local_in2_rate.clone(),
                r.motor_in2_rate.clone(),
                r.boat_in2_rate.clone(),
            ],
            Record::Result(r) => vec![
                r.race_id.to_string(),
                r.rank.to_string(),
                r.racer_id.clone(),
                r.exhibition_time.clone(),
            ],
            Record::Environment(r) => vec![
                r.race_id.to_string(),
                r.weather.clone(),
                r.wind_direction.clone(),
                r.wind_speed.clone(),
                r.wave_height.clone(),
                r.venue.clone(),
            ],
            Record::Odds(r) => std::iter::once(r.race_id.to_string())
                .chain(r.payouts.iter().map(|p| p.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race_id() -> RaceId {
        RaceId::new("2020-09-15", "戸田", "戸田", 1)
    }

    #[test]
    fn test_payout_sentinel() {
        assert_eq!(Payout::Undetected.as_i64(), -1);
        assert_eq!(Payout::Amount(150).as_i64(), 150);
        assert_eq!(Payout::Undetected.to_string(), "-1");
        assert_eq!(serde_json::to_string(&Payout::Undetected).unwrap(), "-1");
    }

    #[test]
    fn test_odds_record_get_set() {
        let mut odds = OddsRecord::undetected(race_id());
        assert_eq!(odds.detected_count(), 0);

        odds.set(BetType::Trio, Payout::Amount(620));
        assert_eq!(odds.get(BetType::Trio), Payout::Amount(620));
        assert_eq!(odds.get(BetType::Trifecta), Payout::Undetected);
        assert_eq!(odds.detected_count(), 1);
    }

    #[test]
    fn test_rows_match_headers() {
        let records = [
            Record::Result(ResultRecord {
                race_id: race_id(),
                rank: 1,
                racer_id: "4041".to_string(),
                exhibition_time: "6.77".to_string(),
            }),
            Record::Environment(EnvironmentRecord {
                race_id: race_id(),
                weather: "晴".to_string(),
                wind_direction: "北東".to_string(),
                wind_speed: "2".to_string(),
                wave_height: "2".to_string(),
                venue: "戸田".to_string(),
            }),
            Record::Odds(OddsRecord::undetected(race_id())),
        ];

        for record in &records {
            assert_eq!(record.row().len(), header(record.kind()).len());
        }
    }

    #[test]
    fn test_odds_row_renders_sentinels() {
        let mut odds = OddsRecord::undetected(race_id());
        odds.set(BetType::Win, Payout::Amount(150));
        let row = Record::Odds(odds).row();

        assert_eq!(row[0], "2020-09-15戸田戸田1R");
        assert_eq!(row[1], "150");
        assert!(row[2..].iter().all(|v| v == "-1"));
    }

    #[test]
    fn test_odds_json_uses_labels() {
        let odds = OddsRecord::undetected(race_id());
        let value = serde_json::to_value(&odds).unwrap();
        assert_eq!(value["wide_3"], -1);
        assert_eq!(value["race_id"], "2020-09-15戸田戸田1R");
    }
}
