// Structured diagnostics emitted by the filter and merge passes.
//
// The core never prints. Callers pass an `EventSink`; the binary uses
// `TracingSink`, tests collect events into a `Vec`.

use tracing::{debug, info, warn};

use crate::filter::Rejection;

/// Something worth reporting while filtering players or merging rankings.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeEvent {
    /// Filtering progress, emitted every `PROGRESS_INTERVAL` records.
    FilterProgress { processed: usize },
    /// A player record could not be read and was skipped.
    PlayerSkipped {
        player_id: String,
        rejection: Rejection,
        detail: String,
    },
    /// Several roster entries share a ranking row's normalized name.
    AmbiguousExactMatch {
        source: String,
        ranking_name: String,
        candidates: usize,
        resolved: bool,
    },
    /// A ranking row was linked through similarity scoring.
    FuzzyMatched {
        source: String,
        ranking_name: String,
        roster_name: String,
        score: f64,
    },
    /// A ranking row found no roster entry.
    Unmatched {
        source: String,
        ranking_name: String,
    },
    /// A ranking CSV record could not be decoded and was left out.
    RankingRecordRejected { source: String, detail: String },
    /// A whole ranking source could not be merged.
    SourceSkipped { source: String, reason: String },
    /// A ranking source finished merging.
    SourceMerged {
        source: String,
        total: usize,
        exact: usize,
        fuzzy: usize,
    },
}

/// Receiver for [`MergeEvent`]s.
pub trait EventSink {
    fn emit(&mut self, event: MergeEvent);
}

impl EventSink for Vec<MergeEvent> {
    fn emit(&mut self, event: MergeEvent) {
        self.push(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: MergeEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: MergeEvent) {
        match event {
            MergeEvent::FilterProgress { processed } => {
                debug!(processed, "filtering players");
            }
            MergeEvent::PlayerSkipped {
                player_id,
                rejection,
                detail,
            } => {
                warn!(%player_id, ?rejection, "skipping player: {detail}");
            }
            MergeEvent::AmbiguousExactMatch {
                source,
                ranking_name,
                candidates,
                resolved,
            } => {
                warn!(
                    %source,
                    resolved,
                    "multiple exact matches for '{ranking_name}' ({candidates} found)"
                );
            }
            MergeEvent::FuzzyMatched {
                source,
                ranking_name,
                roster_name,
                score,
            } => {
                info!(%source, "fuzzy matched '{ranking_name}' -> '{roster_name}' (score: {score:.2})");
            }
            MergeEvent::Unmatched {
                source,
                ranking_name,
            } => {
                debug!(%source, "no match for '{ranking_name}'");
            }
            MergeEvent::RankingRecordRejected { source, detail } => {
                warn!(%source, "skipping unreadable ranking row: {detail}");
            }
            MergeEvent::SourceSkipped { source, reason } => {
                warn!(%source, "ranking merge skipped: {reason}");
            }
            MergeEvent::SourceMerged {
                source,
                total,
                exact,
                fuzzy,
            } => {
                let matched = exact + fuzzy;
                let pct = if total > 0 {
                    matched as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                info!(
                    %source,
                    "{matched}/{total} matched ({pct:.1}%) - {exact} exact, {fuzzy} fuzzy"
                );
            }
        }
    }
}
