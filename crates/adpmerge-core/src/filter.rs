// Player universe filtering.
//
// Sleeper's `players/nfl` payload holds every player the league API has ever
// tracked (~11k). Only a few thousand are fantasy-relevant; this pass keeps
// those and counts why the rest were dropped.

use std::collections::{BTreeSet, HashSet};

use serde_json::{Map, Value};

use crate::events::{EventSink, MergeEvent};
use crate::player::{PositionList, RawPlayer, RosterEntry, Scalar};

/// Positions used when the league does not supply `roster_positions`.
pub const DEFAULT_FANTASY_POSITIONS: &[&str] = &["QB", "RB", "WR", "TE", "K", "DEF"];

/// Emit a progress event every this many records.
const PROGRESS_INTERVAL: usize = 1000;

/// Why a player was left out of the roster. Each rejected player lands in
/// exactly one bucket, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    Inactive,
    DuplicateName,
    NoFantasyPosition,
    InvalidFantasyPosition,
    DataError,
}

/// Per-bucket counts for one filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub processed: usize,
    pub kept: usize,
    pub inactive: usize,
    pub duplicate_name: usize,
    pub no_fantasy_position: usize,
    pub invalid_fantasy_position: usize,
    pub data_errors: usize,
}

impl FilterStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Inactive => self.inactive += 1,
            Rejection::DuplicateName => self.duplicate_name += 1,
            Rejection::NoFantasyPosition => self.no_fantasy_position += 1,
            Rejection::InvalidFantasyPosition => self.invalid_fantasy_position += 1,
            Rejection::DataError => self.data_errors += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.processed - self.kept
    }

    /// Share of processed players that were dropped, in percent.
    pub fn reduction_pct(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.rejected() as f64 / self.processed as f64 * 100.0
    }
}

/// Filtered roster plus the rejection breakdown.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub roster: Vec<RosterEntry>,
    pub stats: FilterStats,
    pub valid_positions: BTreeSet<String>,
}

/// Resolve the valid fantasy position set. An absent or empty league list
/// falls back to [`DEFAULT_FANTASY_POSITIONS`].
pub fn valid_positions(roster_positions: Option<&[String]>) -> BTreeSet<String> {
    match roster_positions {
        Some(positions) if !positions.is_empty() => positions.iter().cloned().collect(),
        _ => DEFAULT_FANTASY_POSITIONS
            .iter()
            .map(|p| p.to_string())
            .collect(),
    }
}

/// Apply the rejection rules to one decoded record. On success returns the
/// player's fantasy positions.
pub fn classify(raw: &RawPlayer, valid: &BTreeSet<String>) -> Result<Vec<String>, Rejection> {
    let lowered = |field: &Option<Scalar>| {
        field
            .as_ref()
            .map(|s| s.to_text().to_lowercase())
            .unwrap_or_default()
    };

    if lowered(&raw.status) == "inactive" {
        return Err(Rejection::Inactive);
    }

    let names = [&raw.full_name, &raw.first_name, &raw.last_name];
    if names.iter().any(|n| lowered(n).contains("duplicate")) {
        return Err(Rejection::DuplicateName);
    }

    if raw.fantasy_positions.is_empty() {
        return Err(Rejection::NoFantasyPosition);
    }

    let positions = match &raw.fantasy_positions {
        PositionList::List(positions) => positions,
        PositionList::Malformed | PositionList::Missing => {
            return Err(Rejection::InvalidFantasyPosition)
        }
    };

    let player_positions: HashSet<&str> = positions.iter().map(String::as_str).collect();
    if !valid.iter().any(|p| player_positions.contains(p.as_str())) {
        return Err(Rejection::InvalidFantasyPosition);
    }

    Ok(positions.clone())
}

/// Reduce the player universe to fantasy-relevant roster entries.
///
/// Roster order follows the order of the universe map, which is the order
/// the players payload listed them in. A record that cannot be
/// decoded is counted as a data error; it never aborts the pass.
pub fn filter_players(
    universe: &Map<String, Value>,
    roster_positions: Option<&[String]>,
    sink: &mut dyn EventSink,
) -> FilterOutcome {
    let valid = valid_positions(roster_positions);
    let mut stats = FilterStats::default();
    let mut roster = Vec::new();

    for (player_id, value) in universe {
        stats.processed += 1;
        if stats.processed % PROGRESS_INTERVAL == 0 {
            sink.emit(MergeEvent::FilterProgress {
                processed: stats.processed,
            });
        }

        let raw = match RawPlayer::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                stats.record(Rejection::DataError);
                sink.emit(MergeEvent::PlayerSkipped {
                    player_id: player_id.clone(),
                    rejection: Rejection::DataError,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        match classify(&raw, &valid) {
            Ok(positions) => {
                stats.kept += 1;
                roster.push(RosterEntry::from_raw(player_id, &raw, positions));
            }
            Err(rejection) => stats.record(rejection),
        }
    }

    FilterOutcome {
        roster,
        stats,
        valid_positions: valid,
    }
}
