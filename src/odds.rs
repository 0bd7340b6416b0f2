//! Odds block sub-parser
//!
//! A payout block in the result bulletin looks like:
//!
//! ```text
//!         単勝     4          480
//!         複勝     4          160  1          110
//!         ２連単   4-1       1170  人気     4
//!         ２連複   1-4        500  人気     2
//!         拡連複   1-4        220  人気     2
//!                  3-4        670  人気     9
//!                  1-3        350  人気     4
//!         ３連単   4-1-3     4330  人気    12
//!         ３連複   1-3-4     1160  人気     4
//! ```
//!
//! One bet type per line, except the two place payouts which share a line.

use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

use crate::grammar::{Grammar, LineAdvance};
use crate::records::{BetType, OddsRecord, Payout};
use crate::scanner::{LineCursor, RaceId};

/// A bet type whose sub-pattern did not match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub race_id: RaceId,
    pub bet: BetType,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} payout not detected for {}",
            self.line, self.bet, self.race_id
        )
    }
}

/// Resolves the ten payouts of one odds block
pub struct OddsParser<'g> {
    grammar: &'g Grammar,
}

impl<'g> OddsParser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Parse the block opened by `opener`, pulling the following lines from `cursor`
    ///
    /// A not-held marker on the opener yields an all-undetected record and
    /// leaves the cursor untouched. Otherwise each bet type that fails to match
    /// is recorded in `diagnostics` and extraction carries on with the next one.
    pub fn parse_group<'a>(
        &self,
        opener: &'a str,
        race_id: RaceId,
        cursor: &mut LineCursor<'a>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> OddsRecord {
        if self.grammar.is_not_held(opener) {
            debug!("{} not held", race_id);
            return OddsRecord::undetected(race_id);
        }

        let mut record = OddsRecord::undetected(race_id);
        let rules = self.grammar.odds_rules();
        let mut current = Some(opener);

        for (i, rule) in rules.iter().enumerate() {
            match current.and_then(|line| capture_payout(&rule.pattern, line)) {
                Some(amount) => record.set(rule.bet, Payout::Amount(amount)),
                None => {
                    let diagnostic = Diagnostic {
                        line: cursor.line_no(),
                        race_id: record.race_id.clone(),
                        bet: rule.bet,
                    };
                    warn!("{}", diagnostic);
                    diagnostics.push(diagnostic);
                }
            }

            let is_last = i + 1 == rules.len();
            if rule.advance == LineAdvance::NextLine && !is_last && current.is_some() {
                current = self.next_group_line(cursor);
            }
        }

        record
    }

    /// Consume the next line unless it belongs to the following race
    fn next_group_line<'a>(&self, cursor: &mut LineCursor<'a>) -> Option<&'a str> {
        if self.grammar.ends_odds_group(cursor.peek()?) {
            return None;
        }
        cursor.advance()
    }
}

fn capture_payout(pattern: &Regex, line: &str) -> Option<u32> {
    pattern.captures(line)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &[&str] = &[
        "        単勝     4          480  ",
        "        複勝     4          160  1          110  ",
        "        ２連単   4-1       1170  人気     4 ",
        "        ２連複   1-4        500  人気     2 ",
        "        拡連複   1-4        220  人気     2 ",
        "                 3-4        670  人気     9 ",
        "                 1-3        350  人気     4 ",
        "        ３連単   4-1-3     4330  人気    12 ",
        "        ３連複   1-3-4     1160  人気     4 ",
        "",
        "   2R       一般                     H1800m",
    ];

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn race_id() -> RaceId {
        RaceId::new("2020-09-15", "福岡", "一般戦", 1)
    }

    fn parse(doc: &[String]) -> (OddsRecord, Vec<Diagnostic>, usize) {
        let grammar = Grammar::new();
        let parser = OddsParser::new(&grammar);
        let mut cursor = LineCursor::new(doc);
        let opener = cursor.advance().unwrap();
        let mut diagnostics = Vec::new();
        let record = parser.parse_group(opener, race_id(), &mut cursor, &mut diagnostics);
        (record, diagnostics, cursor.line_no())
    }

    #[test]
    fn test_full_block() {
        let doc = lines(BLOCK);
        let (record, diagnostics, consumed) = parse(&doc);

        let expected = [480, 160, 110, 1170, 500, 220, 670, 350, 4330, 1160];
        for (bet, amount) in BetType::ALL.iter().zip(expected) {
            assert_eq!(record.get(*bet), Payout::Amount(amount), "{bet}");
        }
        assert!(diagnostics.is_empty());
        // Nine lines: both place payouts come from line 2
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_place_slots_share_one_line() {
        let doc = lines(&[
            "        単勝     2          330  ",
            "        複勝     2          140  5          270  ",
            "        ２連単   2-5       2450  人気    10 ",
        ]);
        let (record, _, _) = parse(&doc);

        assert_eq!(record.get(BetType::Place1), Payout::Amount(140));
        assert_eq!(record.get(BetType::Place2), Payout::Amount(270));
        assert_eq!(record.get(BetType::Exacta), Payout::Amount(2450));
    }

    #[test]
    fn test_not_held_short_circuits() {
        let mut raw = vec!["        単勝     4          480  レース不成立"];
        raw.extend_from_slice(&BLOCK[1..]);
        let doc = lines(&raw);
        let (record, diagnostics, consumed) = parse(&doc);

        assert_eq!(record.payouts, [Payout::Undetected; 10]);
        assert!(diagnostics.is_empty());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_missing_trio_only_affects_trio() {
        let mut raw = BLOCK.to_vec();
        raw[8] = "        ３連複   1-3-4     1160";
        let doc = lines(&raw);
        let (record, diagnostics, _) = parse(&doc);

        assert_eq!(record.get(BetType::Trio), Payout::Undetected);
        assert_eq!(record.detected_count(), 9);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].bet, BetType::Trio);
        assert_eq!(diagnostics[0].line, 9);
    }

    #[test]
    fn test_missing_place_payout_is_independent() {
        let mut raw = BLOCK.to_vec();
        raw[1] = "        複勝     4          160  ";
        let doc = lines(&raw);
        let (record, diagnostics, _) = parse(&doc);

        assert_eq!(record.get(BetType::Place1), Payout::Amount(160));
        assert_eq!(record.get(BetType::Place2), Payout::Undetected);
        assert_eq!(record.get(BetType::Exacta), Payout::Amount(1170));
        assert_eq!(record.get(BetType::Trio), Payout::Amount(1160));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_short_block_stops_at_next_round() {
        let doc = lines(&[
            "        単勝     4          480  ",
            "        ２連単   4-1       1170  人気     4 ",
            "        ２連複   1-4        500  人気     2 ",
            "",
            "   2R       一般                     H1800m",
            "        単勝     2          330  ",
        ]);
        let (record, diagnostics, consumed) = parse(&doc);

        assert_eq!(record.get(BetType::Win), Payout::Amount(480));
        assert_eq!(record.get(BetType::Trio), Payout::Undetected);
        assert!(!diagnostics.is_empty());
        // The round line and the next opener stay unread
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_next_opener_ends_block() {
        let doc = lines(&[
            "        単勝     4          480  ",
            "        複勝     4          160  1          110  ",
            "        単勝     2          330  ",
        ]);
        let (record, _, consumed) = parse(&doc);

        assert_eq!(record.get(BetType::Place2), Payout::Amount(110));
        assert_eq!(record.get(BetType::Exacta), Payout::Undetected);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_truncated_block() {
        let doc = lines(&BLOCK[..4]);
        let (record, diagnostics, consumed) = parse(&doc);

        assert_eq!(record.get(BetType::Quinella), Payout::Amount(500));
        assert_eq!(record.get(BetType::Wide1), Payout::Undetected);
        assert_eq!(record.get(BetType::Trio), Payout::Undetected);
        assert_eq!(diagnostics.len(), 5);
        assert_eq!(consumed, 4);
    }
}
