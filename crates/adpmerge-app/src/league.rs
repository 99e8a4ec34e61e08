// League roster summaries for the Rosters sheet.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
struct LeagueUser {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RosterSettings {
    #[serde(default)]
    wins: i64,
    #[serde(default)]
    losses: i64,
    #[serde(default)]
    ties: i64,
    #[serde(default)]
    fpts: f64,
    #[serde(default)]
    fpts_against: f64,
    #[serde(default)]
    total_moves: i64,
    #[serde(default)]
    waiver_position: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct LeagueRoster {
    #[serde(default)]
    roster_id: Option<i64>,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    players: Option<Vec<String>>,
    #[serde(default)]
    settings: Option<RosterSettings>,
}

/// One team's standing and player list.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSummary {
    pub roster_id: Option<i64>,
    pub owner_id: String,
    pub owner_name: String,
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
    pub fpts: f64,
    pub fpts_against: f64,
    pub total_moves: i64,
    pub waiver_position: i64,
    /// Sleeper player ids, comma separated.
    pub players: String,
}

pub const ROSTER_COLUMNS: &[&str] = &[
    "roster_id",
    "owner_id",
    "owner_name",
    "wins",
    "losses",
    "ties",
    "fpts",
    "fpts_against",
    "total_moves",
    "waiver_position",
    "players",
];

const UNKNOWN_OWNER: &str = "Unknown";

/// Summarize rosters, naming owners from `users`. A roster record that
/// cannot be read is logged and left out.
pub fn summarize_rosters(rosters: &[Value], users: &[Value]) -> Vec<RosterSummary> {
    let names: HashMap<String, String> = users
        .iter()
        .filter_map(|u| LeagueUser::deserialize(u).ok())
        .filter_map(|u| Some((u.user_id?, u.display_name.unwrap_or_else(|| UNKNOWN_OWNER.into()))))
        .collect();

    rosters
        .iter()
        .filter_map(|value| match LeagueRoster::deserialize(value) {
            Ok(roster) => Some(roster),
            Err(e) => {
                warn!("skipping unreadable roster record: {e}");
                None
            }
        })
        .map(|roster| {
            let settings = roster.settings.unwrap_or_default();
            let owner_id = roster.owner_id.unwrap_or_default();
            let owner_name = names
                .get(&owner_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_OWNER.into());
            RosterSummary {
                roster_id: roster.roster_id,
                owner_id,
                owner_name,
                wins: settings.wins,
                losses: settings.losses,
                ties: settings.ties,
                fpts: settings.fpts,
                fpts_against: settings.fpts_against,
                total_moves: settings.total_moves,
                waiver_position: settings.waiver_position,
                players: roster.players.unwrap_or_default().join(", "),
            }
        })
        .collect()
}
