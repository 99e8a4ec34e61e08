// Ranking merge orchestration.
//
// For each ranking source, in configuration order, every ranking row is
// matched against the roster (exact key first, fuzzy second) and its four
// metrics are written onto the matched entry. Rows that find nothing are
// collected per source for manual review.

use serde::Serialize;

use crate::events::{EventSink, MergeEvent};
use crate::matching::{exact_match, fuzzy_match, ExactMatch, NameIndex, DEFAULT_FUZZY_THRESHOLD};
use crate::normalize::normalize_name;
use crate::player::RosterEntry;
use crate::ranking::{RankingRow, RankingSource, RankingTable};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    /// Minimum similarity for a fuzzy match, in `(0, 1]`.
    pub fuzzy_threshold: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// No exact key and nothing scored above the fuzzy threshold.
    NoMatch,
    /// Several roster entries share the name and none plays for the row's
    /// team.
    Ambiguous,
    /// The ranking row has no usable name.
    BlankName,
}

/// A ranking row that could not be linked, kept for the review export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedRow {
    pub name: String,
    pub normalized_name: String,
    pub team: String,
    pub position: String,
    pub reason: UnmatchedReason,
}

/// Match counts for one ranking source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub key: String,
    pub label: String,
    pub total: usize,
    pub exact_matched: usize,
    pub fuzzy_matched: usize,
    pub unmatched: Vec<UnmatchedRow>,
    /// Set when the whole source was skipped.
    pub skipped: Option<String>,
}

impl SourceStats {
    fn new(source: &RankingSource, total: usize) -> Self {
        SourceStats {
            key: source.key.clone(),
            label: source.label.clone(),
            total,
            exact_matched: 0,
            fuzzy_matched: 0,
            unmatched: Vec::new(),
            skipped: None,
        }
    }

    pub fn matched(&self) -> usize {
        self.exact_matched + self.fuzzy_matched
    }

    /// Matched share of the source's rows, in percent.
    pub fn match_rate_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched() as f64 / self.total as f64 * 100.0
    }
}

/// Aggregate result of one merge run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchStatistics {
    pub sources: Vec<SourceStats>,
    pub roster_size: usize,
    /// Roster entries with at least one non-blank ranking metric from any source.
    pub players_with_rankings: usize,
}

impl MatchStatistics {
    pub fn source(&self, key: &str) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.key == key)
    }
}

/// Merged roster and statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub roster: Vec<RosterEntry>,
    pub stats: MatchStatistics,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Merge every ranking table into the roster.
///
/// Any ranking fields the roster already carries for these sources are
/// cleared first, so merging the same inputs twice gives the same result.
/// A table that cannot be projected into rows (missing column) is skipped and
/// reported; the remaining sources still merge.
pub fn merge_rankings(
    mut roster: Vec<RosterEntry>,
    tables: &[RankingTable],
    options: &MergeOptions,
    sink: &mut dyn EventSink,
) -> MergeOutcome {
    for entry in &mut roster {
        for table in tables {
            entry.rankings.remove(&table.source.key);
        }
    }

    let index = NameIndex::build(&roster);
    let mut sources = Vec::with_capacity(tables.len());

    for table in tables {
        let source = &table.source;
        for detail in table.rejected() {
            sink.emit(MergeEvent::RankingRecordRejected {
                source: source.key.clone(),
                detail: detail.clone(),
            });
        }
        let stats = match table.rows() {
            Ok(rows) => merge_source(&mut roster, &index, source, &rows, options, sink),
            Err(e) => {
                let reason = e.to_string();
                sink.emit(MergeEvent::SourceSkipped {
                    source: source.key.clone(),
                    reason: reason.clone(),
                });
                let mut stats = SourceStats::new(source, table.len());
                stats.skipped = Some(reason);
                stats
            }
        };
        sources.push(stats);
    }

    let players_with_rankings = roster.iter().filter(|p| p.has_rankings()).count();
    let roster_size = roster.len();

    MergeOutcome {
        roster,
        stats: MatchStatistics {
            sources,
            roster_size,
            players_with_rankings,
        },
    }
}

enum Resolution {
    Exact(usize),
    Fuzzy(usize),
    Unmatched(UnmatchedReason),
}

/// One source's pass over the roster.
fn merge_source(
    roster: &mut [RosterEntry],
    index: &NameIndex,
    source: &RankingSource,
    rows: &[RankingRow],
    options: &MergeOptions,
    sink: &mut dyn EventSink,
) -> SourceStats {
    let mut stats = SourceStats::new(source, rows.len());

    for row in rows {
        let normalized = normalize_name(&row.name);
        let resolution = resolve(roster, index, source, row, &normalized, options, sink);

        match resolution {
            Resolution::Exact(idx) => {
                apply(&mut roster[idx], source, row);
                stats.exact_matched += 1;
            }
            Resolution::Fuzzy(idx) => {
                apply(&mut roster[idx], source, row);
                stats.fuzzy_matched += 1;
            }
            Resolution::Unmatched(reason) => {
                sink.emit(MergeEvent::Unmatched {
                    source: source.key.clone(),
                    ranking_name: row.name.clone(),
                });
                stats.unmatched.push(UnmatchedRow {
                    name: row.name.clone(),
                    normalized_name: normalized,
                    team: row.team.clone(),
                    position: row.position.clone(),
                    reason,
                });
            }
        }
    }

    sink.emit(MergeEvent::SourceMerged {
        source: source.key.clone(),
        total: stats.total,
        exact: stats.exact_matched,
        fuzzy: stats.fuzzy_matched,
    });

    stats
}

fn resolve(
    roster: &[RosterEntry],
    index: &NameIndex,
    source: &RankingSource,
    row: &RankingRow,
    normalized: &str,
    options: &MergeOptions,
    sink: &mut dyn EventSink,
) -> Resolution {
    if normalized.is_empty() {
        return Resolution::Unmatched(UnmatchedReason::BlankName);
    }

    match exact_match(index, roster, normalized, &row.team) {
        ExactMatch::Found(idx) => Resolution::Exact(idx),
        ExactMatch::Ambiguous {
            candidates,
            resolved,
        } => {
            sink.emit(MergeEvent::AmbiguousExactMatch {
                source: source.key.clone(),
                ranking_name: row.name.clone(),
                candidates,
                resolved: resolved.is_some(),
            });
            // An unresolved tie is not handed to the fuzzy matcher.
            match resolved {
                Some(idx) => Resolution::Exact(idx),
                None => Resolution::Unmatched(UnmatchedReason::Ambiguous),
            }
        }
        ExactMatch::NotFound => match fuzzy_match(index, &row.name, options.fuzzy_threshold) {
            Some(m) => {
                sink.emit(MergeEvent::FuzzyMatched {
                    source: source.key.clone(),
                    ranking_name: row.name.clone(),
                    roster_name: roster[m.index].match_name(),
                    score: m.score,
                });
                Resolution::Fuzzy(m.index)
            }
            None => Resolution::Unmatched(UnmatchedReason::NoMatch),
        },
    }
}

/// Write one ranking row's metrics onto a roster entry as a single unit.
fn apply(entry: &mut RosterEntry, source: &RankingSource, row: &RankingRow) {
    entry
        .rankings
        .insert(source.key.clone(), row.fields.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::ranking::RankingFields;
    use std::collections::BTreeMap;

    fn entry(id: &str, name: &str, team: &str) -> RosterEntry {
        RosterEntry {
            sleeper_id: id.to_string(),
            player_id: id.parse().ok(),
            full_name: name.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            position: "WR".into(),
            team: team.into(),
            age: None,
            height_inches: None,
            weight_lbs: None,
            years_exp: None,
            college: String::new(),
            status: String::new(),
            active: Some(true),
            fantasy_positions: vec!["WR".into()],
            rankings: BTreeMap::new(),
        }
    }

    fn row(name: &str, team: &str, adp: f64) -> RankingRow {
        RankingRow {
            name: name.into(),
            position: "WR".into(),
            team: team.into(),
            fields: RankingFields {
                adp: Some(adp),
                rank: Some(adp.round()),
                delta: Some(-0.5),
                pos_rank: Some("WR1".into()),
            },
        }
    }

    fn merge(roster: Vec<RosterEntry>, tables: &[RankingTable]) -> MergeOutcome {
        merge_rankings(roster, tables, &MergeOptions::default(), &mut NullSink)
    }

    #[test]
    fn exact_match_copies_all_four_fields() {
        let roster = vec![entry("1", "Justin Jefferson", "MIN")];
        let ranking = row("Justin Jefferson", "MIN", 2.1);
        let table = RankingTable::from_rows(RankingSource::ffpc(), &[ranking.clone()]);

        let out = merge(roster, &[table]);
        assert_eq!(out.roster[0].ranking("ffpc"), Some(&ranking.fields));
        let s = out.stats.source("ffpc").unwrap();
        assert_eq!(s.exact_matched, 1);
        assert_eq!(s.fuzzy_matched, 0);
        assert!(s.unmatched.is_empty());
    }

    #[test]
    fn ambiguous_name_resolved_by_team() {
        let roster = vec![
            entry("1", "Mike Williams", "MIN"),
            entry("2", "Mike Williams", "KC"),
        ];
        let table = RankingTable::from_rows(
            RankingSource::ffpc(),
            &[row("Mike Williams", "KC", 80.0)],
        );

        let out = merge(roster, &[table]);
        assert!(out.roster[0].ranking("ffpc").is_none());
        assert_eq!(out.roster[1].ranking("ffpc").unwrap().adp, Some(80.0));
        assert_eq!(out.stats.source("ffpc").unwrap().exact_matched, 1);
    }

    #[test]
    fn ambiguous_name_without_team_is_unmatched_not_fuzzed() {
        let roster = vec![
            entry("1", "Mike Williams", "MIN"),
            entry("2", "Mike Williams", "KC"),
        ];
        let table = RankingTable::from_rows(
            RankingSource::ffpc(),
            &[row("Mike Williams", "NYJ", 80.0)],
        );

        let out = merge(roster, &[table]);
        assert!(out.roster.iter().all(|p| !p.has_rankings()));
        let s = out.stats.source("ffpc").unwrap();
        assert_eq!(s.matched(), 0);
        assert_eq!(s.unmatched.len(), 1);
        assert_eq!(s.unmatched[0].reason, UnmatchedReason::Ambiguous);
    }

    #[test]
    fn marquise_brown_links_once() {
        let roster = vec![
            entry("1", "Hollywood Brown", "KC"),
            entry("2", "Marquise Goodwin", "FA"),
        ];
        let table =
            RankingTable::from_rows(RankingSource::ffpc(), &[row("Marquise Brown", "KC", 90.0)]);

        let out = merge(roster, &[table]);
        let linked: Vec<_> = out.roster.iter().filter(|p| p.has_rankings()).collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].full_name, "Hollywood Brown");
        assert_eq!(out.stats.source("ffpc").unwrap().matched(), 1);
    }

    #[test]
    fn fuzzy_fallback_counts_separately() {
        let roster = vec![entry("1", "Gabriel Davis", "JAX")];
        let table =
            RankingTable::from_rows(RankingSource::ffpc(), &[row("Gabriel Davs", "JAX", 150.0)]);

        let mut events: Vec<MergeEvent> = Vec::new();
        let out = merge_rankings(roster, &[table], &MergeOptions::default(), &mut events);
        let s = out.stats.source("ffpc").unwrap();
        assert_eq!(s.exact_matched, 0);
        assert_eq!(s.fuzzy_matched, 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, MergeEvent::FuzzyMatched { roster_name, .. } if roster_name == "Gabriel Davis")));
    }

    #[test]
    fn unmatched_row_preserves_identity() {
        let roster = vec![entry("1", "Josh Allen", "BUF")];
        let mut rookie = row("Zzyzx Quasar", "FA", 210.0);
        rookie.position = "RB".into();
        let table = RankingTable::from_rows(RankingSource::underdog(), &[rookie]);

        let out = merge(roster, &[table]);
        let s = out.stats.source("ud").unwrap();
        assert_eq!(
            s.unmatched,
            vec![UnmatchedRow {
                name: "Zzyzx Quasar".into(),
                normalized_name: "zzyzx quasar".into(),
                team: "FA".into(),
                position: "RB".into(),
                reason: UnmatchedReason::NoMatch,
            }]
        );
    }

    #[test]
    fn blank_ranking_name_is_unmatched() {
        let roster = vec![entry("1", "Josh Allen", "BUF")];
        let table = RankingTable::from_rows(RankingSource::ffpc(), &[row("  ", "BUF", 1.0)]);

        let out = merge(roster, &[table]);
        let s = out.stats.source("ffpc").unwrap();
        assert_eq!(s.unmatched[0].reason, UnmatchedReason::BlankName);
        assert!(!out.roster[0].has_rankings());
    }

    #[test]
    fn sources_merge_independently() {
        let roster = vec![
            entry("1", "Justin Jefferson", "MIN"),
            entry("2", "Josh Allen", "BUF"),
        ];
        let ffpc = RankingTable::from_rows(RankingSource::ffpc(), &[row("Justin Jefferson", "MIN", 2.0)]);
        let ud = RankingTable::from_rows(
            RankingSource::underdog(),
            &[row("Justin Jefferson", "MIN", 3.0), row("Josh Allen", "BUF", 25.0)],
        );

        let out = merge(roster, &[ffpc, ud]);
        assert_eq!(out.roster[0].ranking("ffpc").unwrap().adp, Some(2.0));
        assert_eq!(out.roster[0].ranking("ud").unwrap().adp, Some(3.0));
        assert!(out.roster[1].ranking("ffpc").is_none());
        assert_eq!(out.roster[1].ranking("ud").unwrap().adp, Some(25.0));
        assert_eq!(out.stats.players_with_rankings, 2);
        assert_eq!(out.stats.roster_size, 2);
        let keys: Vec<_> = out.stats.sources.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["ffpc", "ud"]);
    }

    #[test]
    fn malformed_source_skipped_others_kept() {
        let roster = vec![entry("1", "Justin Jefferson", "MIN")];
        let broken = RankingTable::from_reader(
            RankingSource::ffpc(),
            "Player,ADP\nJustin Jefferson,2.0".as_bytes(),
        )
        .unwrap();
        let ud = RankingTable::from_rows(RankingSource::underdog(), &[row("Justin Jefferson", "MIN", 3.0)]);

        let mut events: Vec<MergeEvent> = Vec::new();
        let out = merge_rankings(roster, &[broken, ud], &MergeOptions::default(), &mut events);
        let ffpc = out.stats.source("ffpc").unwrap();
        assert!(ffpc.skipped.is_some());
        assert_eq!(ffpc.total, 1);
        assert_eq!(ffpc.matched(), 0);
        assert_eq!(out.roster[0].ranking("ud").unwrap().adp, Some(3.0));
        assert!(events
            .iter()
            .any(|e| matches!(e, MergeEvent::SourceSkipped { source, .. } if source == "ffpc")));
    }

    #[test]
    fn merge_is_idempotent() {
        let roster = vec![
            entry("1", "Justin Jefferson", "MIN"),
            entry("2", "Gabriel Davis", "JAX"),
            entry("3", "Josh Allen", "BUF"),
        ];
        let tables = [
            RankingTable::from_rows(
                RankingSource::ffpc(),
                &[row("Justin Jefferson", "MIN", 2.0), row("Gabriel Davs", "JAX", 150.0)],
            ),
            RankingTable::from_rows(RankingSource::underdog(), &[row("Nobody Here", "FA", 200.0)]),
        ];

        let first = merge(roster.clone(), &tables);
        let second = merge(roster, &tables);
        assert_eq!(first, second);

        // Re-merging the merged roster changes nothing either.
        let third = merge(first.roster.clone(), &tables);
        assert_eq!(third, first);
    }

    #[test]
    fn later_row_overwrites_as_a_unit() {
        let roster = vec![entry("1", "Justin Jefferson", "MIN")];
        let mut second = row("Justin Jefferson", "MIN", 5.0);
        second.fields.pos_rank = None;
        let table = RankingTable::from_rows(
            RankingSource::ffpc(),
            &[row("Justin Jefferson", "MIN", 2.0), second.clone()],
        );

        let out = merge(roster, &[table]);
        assert_eq!(out.roster[0].ranking("ffpc"), Some(&second.fields));
    }

    #[test]
    fn blank_metrics_match_but_do_not_count_as_ranked() {
        let roster = vec![
            entry("1", "Justin Jefferson", "MIN"),
            entry("2", "Josh Allen", "BUF"),
        ];
        let table = RankingTable::from_reader(
            RankingSource::ffpc(),
            "Name,Position,Team,ADP,ETR_Rank,Delta,Pos_Rank\n\
             Justin Jefferson,WR,MIN,,,,\n\
             Josh Allen,QB,BUF,20.5,,,\n"
                .as_bytes(),
        )
        .unwrap();

        let out = merge(roster, &[table]);
        let blank = out.roster[0].ranking("ffpc").unwrap();
        assert!(blank.is_absent());
        assert!(!out.roster[0].has_rankings());
        assert_eq!(out.stats.source("ffpc").unwrap().exact_matched, 2);
        assert_eq!(out.stats.players_with_rankings, 1);
    }

    #[test]
    fn short_ranking_row_still_counted() {
        let roster = vec![entry("1", "Justin Jefferson", "MIN")];
        let table = RankingTable::from_reader(
            RankingSource::ffpc(),
            "Name,Position,Team,ADP\nJustin Jefferson,WR,MIN,2.0\nZzyzx Rookie,RB\n".as_bytes(),
        )
        .unwrap();

        let out = merge(roster, &[table]);
        let s = out.stats.source("ffpc").unwrap();
        assert_eq!(s.total, 2);
        assert_eq!(s.matched(), 1);
        assert_eq!(s.unmatched.len(), 1);
        assert_eq!(s.unmatched[0].name, "Zzyzx Rookie");
        assert_eq!(s.unmatched[0].team, "");
    }

    #[test]
    fn undecodable_ranking_rows_reported_as_events() {
        let roster = vec![entry("1", "Justin Jefferson", "MIN")];
        let mut data = b"Name,Position,Team,ADP\nJustin Jefferson,WR,MIN,2.0\n".to_vec();
        data.extend_from_slice(b"\xff\xfe,WR,MIN,9.0\n");
        let table = RankingTable::from_reader(RankingSource::ffpc(), data.as_slice()).unwrap();

        let mut events: Vec<MergeEvent> = Vec::new();
        let out = merge_rankings(roster, &[table], &MergeOptions::default(), &mut events);
        assert_eq!(out.stats.source("ffpc").unwrap().total, 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, MergeEvent::RankingRecordRejected { source, .. } if source == "ffpc"))
                .count(),
            1
        );
    }

    #[test]
    fn match_rate_percentage() {
        let mut s = SourceStats::new(&RankingSource::ffpc(), 4);
        s.exact_matched = 2;
        s.fuzzy_matched = 1;
        assert!((s.match_rate_pct() - 75.0).abs() < 1e-9);
        assert_eq!(SourceStats::new(&RankingSource::ffpc(), 0).match_rate_pct(), 0.0);
    }
}
