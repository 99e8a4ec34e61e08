// One fetch of Sleeper data, as cached and exported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// What to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub league_id: Option<String>,
    pub include_players: bool,
    pub weeks: Vec<u32>,
}

/// Provenance of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub fetched_at: DateTime<Utc>,
    pub league_id: Option<String>,
    pub included_players: bool,
    pub weeks: Vec<u32>,
}

impl SnapshotMetadata {
    /// Whether a snapshot fetched with this metadata answers `request`.
    pub fn covers(&self, request: &FetchRequest) -> bool {
        self.league_id == request.league_id
            && (self.included_players || !request.include_players)
            && request.weeks.iter().all(|w| self.weeks.contains(w))
    }
}

/// Everything fetched in one run. League sections are absent when no league
/// id was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub players: Option<Map<String, Value>>,
    #[serde(default)]
    pub league_info: Option<Value>,
    #[serde(default)]
    pub users: Option<Vec<Value>>,
    #[serde(default)]
    pub rosters: Option<Vec<Value>>,
    /// Week number to that week's matchup records.
    #[serde(default)]
    pub matchups: BTreeMap<u32, Vec<Value>>,
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    pub fn empty(request: &FetchRequest, fetched_at: DateTime<Utc>) -> Self {
        Snapshot {
            players: None,
            league_info: None,
            users: None,
            rosters: None,
            matchups: BTreeMap::new(),
            metadata: SnapshotMetadata {
                fetched_at,
                league_id: request.league_id.clone(),
                included_players: request.include_players,
                weeks: request.weeks.clone(),
            },
        }
    }

    /// The league's `roster_positions`, when it lists them as strings.
    pub fn roster_positions(&self) -> Option<Vec<String>> {
        let positions = self.league_info.as_ref()?.get("roster_positions")?.as_array()?;
        Some(
            positions
                .iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// Each data section and whether it holds anything.
    pub fn sections(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("players", self.players.as_ref().is_some_and(|p| !p.is_empty())),
            ("league_info", self.league_info.as_ref().is_some_and(|l| !l.is_null())),
            ("users", self.users.as_ref().is_some_and(|u| !u.is_empty())),
            ("rosters", self.rosters.as_ref().is_some_and(|r| !r.is_empty())),
            ("matchups", !self.matchups.is_empty()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(league: Option<&str>, players: bool, weeks: &[u32]) -> FetchRequest {
        FetchRequest {
            league_id: league.map(str::to_string),
            include_players: players,
            weeks: weeks.to_vec(),
        }
    }

    #[test]
    fn roster_positions_read_from_league() {
        let mut snap = Snapshot::empty(&request(Some("1"), false, &[]), Utc::now());
        assert_eq!(snap.roster_positions(), None);

        snap.league_info = Some(json!({ "roster_positions": ["QB", "RB", "SUPER_FLEX", 7] }));
        assert_eq!(
            snap.roster_positions(),
            Some(vec!["QB".to_string(), "RB".into(), "SUPER_FLEX".into()])
        );
    }

    #[test]
    fn metadata_coverage() {
        let meta = Snapshot::empty(&request(Some("42"), true, &[1, 2]), Utc::now()).metadata;
        assert!(meta.covers(&request(Some("42"), true, &[1])));
        assert!(meta.covers(&request(Some("42"), false, &[])));
        assert!(!meta.covers(&request(Some("43"), true, &[1])));
        assert!(!meta.covers(&request(Some("42"), true, &[3])));

        let no_players = Snapshot::empty(&request(None, false, &[]), Utc::now()).metadata;
        assert!(!no_players.covers(&request(None, true, &[])));
    }

    #[test]
    fn sections_report_availability() {
        let mut snap = Snapshot::empty(&request(None, true, &[]), Utc::now());
        snap.users = Some(vec![]);
        snap.rosters = Some(vec![json!({ "roster_id": 1 })]);
        let sections = snap.sections();
        assert!(sections.contains(&("users", false)));
        assert!(sections.contains(&("rosters", true)));
        assert!(sections.contains(&("players", false)));
    }

    #[test]
    fn serde_round_trip_keeps_week_keys() {
        let mut snap = Snapshot::empty(&request(Some("7"), false, &[3]), Utc::now());
        snap.matchups.insert(3, vec![json!({ "matchup_id": 1, "points": 101.5 })]);
        let text = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snap);
    }
}
