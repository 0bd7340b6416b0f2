//! Line grammar for boatrace text bulletins
//!
//! Every pattern is compiled once in [`Grammar::new`] and shared by reference.
//! Anchoring matters: the bulletins mix halfwidth and fullwidth characters at
//! fixed columns, so entry patterns are anchored at the start of the line while
//! the venue and round markers may appear anywhere.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::records::BetType;

/// Lines between the header marker and the race-name line
pub const RACE_NAME_OFFSET: usize = 2;

/// Lines between the race-name line and the venue line
pub const VENUE_OFFSET: usize = 2;

/// Bulletin kinds published by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// 番組表, archive letter `B`
    Schedule,
    /// 競走成績, archive letter `K`
    Result,
}

impl DocumentKind {
    /// Letter used in archive URLs and member file names
    pub fn letter(self) -> char {
        match self {
            DocumentKind::Schedule => 'B',
            DocumentKind::Result => 'K',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DocumentKind::Schedule => "schedule",
            DocumentKind::Result => "result",
        }
    }
}

/// Record kinds the extractor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Schedule,
    Result,
    Environment,
    Odds,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Schedule,
        RecordKind::Result,
        RecordKind::Environment,
        RecordKind::Odds,
    ];

    /// The bulletin that carries this record kind
    pub fn document_kind(self) -> DocumentKind {
        match self {
            RecordKind::Schedule => DocumentKind::Schedule,
            RecordKind::Result | RecordKind::Environment | RecordKind::Odds => {
                DocumentKind::Result
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Schedule => "schedule",
            RecordKind::Result => "result",
            RecordKind::Environment => "environment",
            RecordKind::Odds => "odds",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schedule" | "programs" => Ok(RecordKind::Schedule),
            "result" | "results" => Ok(RecordKind::Result),
            "environment" | "env" => Ok(RecordKind::Environment),
            "odds" | "payouts" => Ok(RecordKind::Odds),
            _ => Err(format!(
                "unknown record kind {s:?}; use schedule, result, environment or odds"
            )),
        }
    }
}

/// Whether the odds cursor moves to the next line after a bet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAdvance {
    NextLine,
    /// The next bet type is printed on the same line (place payouts)
    SameLine,
}

/// One bet-type sub-grammar of the odds block
#[derive(Debug, Clone)]
pub struct OddsRule {
    pub bet: BetType,
    pub pattern: Regex,
    pub advance: LineAdvance,
}

/// Compiled patterns for both bulletin kinds
#[derive(Debug, Clone)]
pub struct Grammar {
    schedule_header: Regex,
    result_header: Regex,
    race_name: Regex,
    venue: Regex,
    round_marker: Regex,
    schedule_entry: Regex,
    result_entry: Regex,
    environment_entry: Regex,
    odds_opener: Regex,
    not_held: Regex,
    odds_rules: Vec<OddsRule>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("built-in grammar pattern must compile")
}

impl Grammar {
    pub fn new() -> Self {
        use BetType::*;
        use LineAdvance::*;

        let odds = [
            (Win, r"^\s+単勝\s+\d\s+(\d+)", NextLine),
            (Place1, r"^\s+複勝\s+\d\s+(\d+)", SameLine),
            (Place2, r"^\s+複勝\s+\d\s+\d+\s+\d\s+(\d+)", NextLine),
            (Exacta, r"^\s+２連単\s+\d-\d\s+(\d+)", NextLine),
            (Quinella, r"^\s+２連複\s+\d-\d\s+(\d+)", NextLine),
            (Wide1, r"^\s+拡連複\s+\d-\d\s+(\d+)", NextLine),
            (Wide2, r"^\s+\d-\d\s+(\d+)", NextLine),
            (Wide3, r"^\s+\d-\d\s+(\d+)", NextLine),
            (Trifecta, r"^\s+３連単\s+\d-\d-\d\s+(\d+)", NextLine),
            (Trio, r"^\s+３連複\s+\d-\d-\d\s+(\d+)\s+人気\s+\d+", NextLine),
        ];

        Self {
            schedule_header: pattern(r"^\s{28}＊＊＊　番組表　＊＊＊"),
            result_header: pattern(r"^\s{28}＊＊＊　競走成績　＊＊＊"),
            race_name: pattern(r"^\s{10}(\S+)"),
            venue: pattern(r"ボートレース(\D+?)(?:\s|$)"),
            round_marker: pattern(r"H1800m|Ｈ１８００ｍ"),
            schedule_entry: pattern(
                r"^([1-6])\s(\d{4})(\D+)(\d{2})(\D+)(\d{2})([AB][12])\s+(\d+\.\d{2})\s+(\d+\.\d{2})\s+(\d+\.\d{2})\s+(\d+\.\d{2})\s+\d+\s+(\d+\.\d{2})\s+\d+\s+(\d+\.\d{2})",
            ),
            result_entry: pattern(
                r"^\s+0(\d)\s+\d\s+(\d{4})\s+\D+\s\d+\s+\d+\s+(\d+\.\d{2})",
            ),
            environment_entry: pattern(
                r"^\s*\d+R\s+.*?(?:H1800m|Ｈ１８００ｍ)\s+(\S+)\s+風\s+(\S+)\s+(\d+)m\s+波\s+(\d+)cm",
            ),
            odds_opener: pattern(r"^\s+単勝"),
            not_held: pattern(r"不成立|中止"),
            odds_rules: odds
                .into_iter()
                .map(|(bet, re, advance)| OddsRule {
                    bet,
                    pattern: pattern(re),
                    advance,
                })
                .collect(),
        }
    }

    /// True if the line opens a race block of the given bulletin kind
    pub fn is_header(&self, kind: DocumentKind, line: &str) -> bool {
        match kind {
            DocumentKind::Schedule => self.schedule_header.is_match(line),
            DocumentKind::Result => self.result_header.is_match(line),
        }
    }

    pub fn race_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.race_name
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    pub fn venue<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.venue
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|venue| !venue.is_empty())
    }

    pub fn is_round_marker(&self, line: &str) -> bool {
        self.round_marker.is_match(line)
    }

    pub fn schedule_entry(&self) -> &Regex {
        &self.schedule_entry
    }

    pub fn result_entry(&self) -> &Regex {
        &self.result_entry
    }

    pub fn environment_entry(&self) -> &Regex {
        &self.environment_entry
    }

    pub fn is_odds_opener(&self, line: &str) -> bool {
        self.odds_opener.is_match(line)
    }

    pub fn is_not_held(&self, line: &str) -> bool {
        self.not_held.is_match(line)
    }

    /// Lines that always start something new: header, round marker or odds opener
    pub fn ends_odds_group(&self, line: &str) -> bool {
        self.is_round_marker(line)
            || self.is_odds_opener(line)
            || self.result_header.is_match(line)
            || self.schedule_header.is_match(line)
    }

    /// Odds sub-grammars in the order they appear in the bulletin
    pub fn odds_rules(&self) -> &[OddsRule] {
        &self.odds_rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_markers_are_kind_specific() {
        let grammar = Grammar::new();
        let result = format!("{}＊＊＊　競走成績　＊＊＊", " ".repeat(28));
        let schedule = format!("{}＊＊＊　番組表　＊＊＊", " ".repeat(28));

        assert!(grammar.is_header(DocumentKind::Result, &result));
        assert!(!grammar.is_header(DocumentKind::Schedule, &result));
        assert!(grammar.is_header(DocumentKind::Schedule, &schedule));
        assert!(!grammar.is_header(DocumentKind::Result, &schedule));
    }

    #[test]
    fn test_header_requires_exact_indent() {
        let grammar = Grammar::new();
        let shallow = format!("{}＊＊＊　競走成績　＊＊＊", " ".repeat(10));
        assert!(!grammar.is_header(DocumentKind::Result, &shallow));
    }

    #[test]
    fn test_race_name_needs_ten_spaces() {
        let grammar = Grammar::new();
        assert_eq!(grammar.race_name("          戸田"), Some("戸田"));
        assert_eq!(
            grammar.race_name("          ＧⅢマスターズリーグ第７戦　　"),
            Some("ＧⅢマスターズリーグ第７戦")
        );
        assert_eq!(grammar.race_name("xxx"), None);
        assert_eq!(grammar.race_name("     戸田"), None);
    }

    #[test]
    fn test_venue_anywhere_in_line() {
        let grammar = Grammar::new();
        assert_eq!(grammar.venue("ボートレース戸田 "), Some("戸田"));
        assert_eq!(
            grammar.venue("   第 3日          2020/ 9/15                             ボートレース福岡"),
            Some("福岡")
        );
        assert_eq!(grammar.venue("ボートレース江戸川　　"), Some("江戸川"));
        assert_eq!(grammar.venue("戸田"), None);
    }

    #[test]
    fn test_round_marker_both_widths() {
        let grammar = Grammar::new();
        assert!(grammar.is_round_marker("   1R       予選                     H1800m  晴"));
        assert!(grammar.is_round_marker("　１Ｒ  予選　　　　          Ｈ１８００ｍ  電話投票締切予定１０：３８"));
        assert!(!grammar.is_round_marker("  01  1 4041 小　林　基　樹 44   30  6.77"));
    }

    #[test]
    fn test_odds_rules_order_and_place_quirk() {
        let grammar = Grammar::new();
        let rules = grammar.odds_rules();
        assert_eq!(rules.len(), 10);
        assert_eq!(
            rules.iter().map(|r| r.bet).collect::<Vec<_>>(),
            BetType::ALL.to_vec()
        );

        let same_line: Vec<BetType> = rules
            .iter()
            .filter(|r| r.advance == LineAdvance::SameLine)
            .map(|r| r.bet)
            .collect();
        assert_eq!(same_line, vec![BetType::Place1]);
    }

    #[test]
    fn test_record_kind_from_str() {
        assert_eq!("odds".parse::<RecordKind>(), Ok(RecordKind::Odds));
        assert_eq!("programs".parse::<RecordKind>(), Ok(RecordKind::Schedule));
        assert!("trifecta".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_record_kind_document() {
        assert_eq!(RecordKind::Schedule.document_kind(), DocumentKind::Schedule);
        assert_eq!(RecordKind::Odds.document_kind(), DocumentKind::Result);
        assert_eq!(RecordKind::Environment.document_kind().letter(), 'K');
    }
}
