// Player records: the raw Sleeper shape and the filtered roster entry.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::ranking::RankingFields;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player record is not an object")]
    NotARecord,

    #[error("malformed player record: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Raw record
// ---------------------------------------------------------------------------

/// A scalar JSON value as Sleeper sends it. Numeric-looking fields arrive as
/// numbers for most players and as strings for some ("6'2\"", "220").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// String form, matching how the value would print.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// The `fantasy_positions` field, which is usually a list of codes but can be
/// missing, null, or the wrong shape entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PositionList {
    #[default]
    Missing,
    List(Vec<String>),
    /// Present but not a list of strings.
    Malformed,
}

impl PositionList {
    /// True when the field carries nothing usable: missing, null, an empty
    /// list, or a falsy scalar such as `""` or `0`.
    pub fn is_empty(&self) -> bool {
        matches!(self, PositionList::Missing) || matches!(self, PositionList::List(v) if v.is_empty())
    }
}

impl<'de> Deserialize<'de> for PositionList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(serde_json::Value::Null) => PositionList::Missing,
            Some(serde_json::Value::Array(items)) => {
                let codes: Option<Vec<String>> = items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                match codes {
                    Some(codes) => PositionList::List(codes),
                    None => PositionList::Malformed,
                }
            }
            Some(serde_json::Value::String(s)) if s.is_empty() => PositionList::Missing,
            Some(serde_json::Value::Bool(false)) => PositionList::Missing,
            Some(serde_json::Value::Number(n)) if n.as_f64() == Some(0.0) => {
                PositionList::Missing
            }
            Some(_) => PositionList::Malformed,
        })
    }
}

/// One entry of the Sleeper `players/nfl` universe. Every field is optional;
/// unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlayer {
    #[serde(default)]
    pub status: Option<Scalar>,
    #[serde(default)]
    pub full_name: Option<Scalar>,
    #[serde(default)]
    pub first_name: Option<Scalar>,
    #[serde(default)]
    pub last_name: Option<Scalar>,
    #[serde(default)]
    pub fantasy_positions: PositionList,
    #[serde(default)]
    pub height: Option<Scalar>,
    #[serde(default)]
    pub weight: Option<Scalar>,
    #[serde(default)]
    pub age: Option<Scalar>,
    #[serde(default)]
    pub years_exp: Option<Scalar>,
    #[serde(default)]
    pub college: Option<Scalar>,
    #[serde(default)]
    pub position: Option<Scalar>,
    #[serde(default)]
    pub team: Option<Scalar>,
    #[serde(default)]
    pub active: Option<Scalar>,
}

impl RawPlayer {
    /// Decode one record of the universe. Fails for non-objects and for
    /// fields that hold arrays or objects where a scalar belongs.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, PlayerError> {
        if !value.is_object() {
            return Err(PlayerError::NotARecord);
        }
        Ok(RawPlayer::deserialize(value)?)
    }
}

fn text(field: &Option<Scalar>) -> String {
    field.as_ref().map(Scalar::to_text).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Roster entry
// ---------------------------------------------------------------------------

/// A fantasy-relevant player after filtering. Ranking groups are keyed by
/// ranking source; a missing key means that source found no match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub sleeper_id: String,
    pub player_id: Option<u64>,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub team: String,
    pub age: Option<f64>,
    pub height_inches: Option<f64>,
    pub weight_lbs: Option<f64>,
    pub years_exp: Option<f64>,
    pub college: String,
    pub status: String,
    pub active: Option<bool>,
    pub fantasy_positions: Vec<String>,
    pub rankings: BTreeMap<String, RankingFields>,
}

impl RosterEntry {
    /// Project a raw record that already passed the filter.
    pub fn from_raw(sleeper_id: &str, raw: &RawPlayer, fantasy_positions: Vec<String>) -> Self {
        RosterEntry {
            sleeper_id: sleeper_id.to_string(),
            player_id: parse_id(sleeper_id),
            full_name: text(&raw.full_name),
            first_name: text(&raw.first_name),
            last_name: text(&raw.last_name),
            position: text(&raw.position),
            team: text(&raw.team),
            age: raw.age.as_ref().and_then(parse_numeric),
            height_inches: raw.height.as_ref().and_then(parse_height),
            weight_lbs: raw.weight.as_ref().and_then(parse_numeric),
            years_exp: raw.years_exp.as_ref().and_then(parse_numeric),
            college: text(&raw.college),
            status: canonical_status(raw.status.as_ref().map(Scalar::to_text).as_deref()),
            active: raw.active.as_ref().and_then(parse_bool),
            fantasy_positions,
            rankings: BTreeMap::new(),
        }
    }

    /// Name used for matching. Team defenses carry no `full_name`, so fall
    /// back to first + last.
    pub fn match_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            return self.full_name.clone();
        }
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Ranking fields applied by `source`, if that source matched this player.
    pub fn ranking(&self, source: &str) -> Option<&RankingFields> {
        self.rankings.get(source)
    }

    /// Whether any source left at least one non-absent metric on this entry.
    pub fn has_rankings(&self) -> bool {
        self.rankings.values().any(|f| !f.is_absent())
    }
}

// ---------------------------------------------------------------------------
// Field coercion
// ---------------------------------------------------------------------------

fn parse_id(id: &str) -> Option<u64> {
    id.trim().parse().ok()
}

/// Coerce a scalar to a number. Strings are trimmed; empty or unparseable
/// text yields `None` rather than an error.
pub fn parse_numeric(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Int(i) => Some(*i as f64),
        Scalar::Float(f) if f.is_finite() => Some(*f),
        Scalar::Float(_) | Scalar::Bool(_) => None,
        Scalar::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok().filter(|v| v.is_finite())
        }
    }
}

/// Parse a height into inches.
///
/// Accepted forms, first match wins: digits only (already inches),
/// `6'2` / `6'2"` (feet'inches), `6-2` (feet-inches), decimal inches.
pub fn parse_height(value: &Scalar) -> Option<f64> {
    let raw = match value {
        Scalar::Int(i) => return Some(*i as f64),
        Scalar::Float(f) => return f.is_finite().then_some(*f),
        Scalar::Bool(_) => return None,
        Scalar::Text(s) => s.trim(),
    };
    if raw.is_empty() {
        return None;
    }

    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse::<u32>().ok().map(f64::from);
    }

    if raw.contains('\'') {
        let cleaned = raw.replace('"', "");
        return feet_inches(&cleaned, '\'');
    }

    if raw.contains('-') {
        return feet_inches(raw, '-');
    }

    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn feet_inches(raw: &str, separator: char) -> Option<f64> {
    let mut parts = raw.split(separator);
    let (feet, inches) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let feet: u32 = feet.trim().parse().ok()?;
    let inches: u32 = match inches.trim() {
        "" => 0,
        s => s.parse().ok()?,
    };
    let total = feet.checked_mul(12)?.checked_add(inches)?;
    Some(f64::from(total))
}

fn parse_bool(value: &Scalar) -> Option<bool> {
    match value {
        Scalar::Bool(b) => Some(*b),
        Scalar::Int(i) => Some(*i != 0),
        Scalar::Float(_) => None,
        Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
    }
}

/// Map Sleeper's long-form injury/roster statuses onto short codes.
/// Anything unrecognized is kept, lowercased and trimmed.
pub fn canonical_status(status: Option<&str>) -> String {
    let Some(status) = status else {
        return String::new();
    };
    let cleaned = status.trim().to_lowercase();
    let code = match cleaned.as_str() {
        "injured reserve" => "IR",
        "physically unable to perform" => "PUP",
        "practice squad" => "PS",
        "non-football injury" => "NFI",
        "suspended" => "SUSP",
        "commissioner exempt" => "EXEMPT",
        _ => return cleaned,
    };
    code.to_string()
}
