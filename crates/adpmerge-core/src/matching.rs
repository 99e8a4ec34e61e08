// Ranking-name to roster lookup: exact key matching with team tie-breaks,
// then LCS-ratio fuzzy matching.

use std::collections::HashMap;

use crate::normalize::normalize_name;
use crate::player::RosterEntry;

/// Default minimum similarity for a fuzzy match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

// ---------------------------------------------------------------------------
// Name index
// ---------------------------------------------------------------------------

/// Normalized names for every roster entry, built once per merge run and
/// shared by every ranking source.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    keys: Vec<String>,
    by_key: HashMap<String, Vec<usize>>,
}

impl NameIndex {
    pub fn build(roster: &[RosterEntry]) -> Self {
        let keys: Vec<String> = roster.iter().map(|p| normalize_name(&p.match_name())).collect();
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, key) in keys.iter().enumerate() {
            by_key.entry(key.clone()).or_default().push(idx);
        }
        NameIndex { keys, by_key }
    }

    /// Roster indices sharing `key`, in roster order.
    pub fn candidates(&self, key: &str) -> &[usize] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Exact matching
// ---------------------------------------------------------------------------

/// Outcome of an exact lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExactMatch {
    /// The roster entry at this index.
    Found(usize),
    /// Several entries share the name and `candidates` were tried; `resolved`
    /// holds the team-matched index when there was one.
    Ambiguous {
        candidates: usize,
        resolved: Option<usize>,
    },
    /// No roster entry has this name.
    NotFound,
}

/// Look up a normalized ranking name. Ties are broken by team code; the
/// first candidate in roster order whose team equals `team` wins.
pub fn exact_match(
    index: &NameIndex,
    roster: &[RosterEntry],
    normalized: &str,
    team: &str,
) -> ExactMatch {
    match index.candidates(normalized) {
        [] => ExactMatch::NotFound,
        [only] => ExactMatch::Found(*only),
        several => {
            let resolved = several
                .iter()
                .copied()
                .find(|&idx| same_team(&roster[idx].team, team));
            ExactMatch::Ambiguous {
                candidates: several.len(),
                resolved,
            }
        }
    }
}

fn same_team(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

// ---------------------------------------------------------------------------
// Fuzzy matching
// ---------------------------------------------------------------------------

/// Best fuzzy candidate and its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    pub index: usize,
    pub score: f64,
}

/// Score `raw_name` against every roster key and return the best candidate
/// at or above `threshold`. Ties keep the first candidate seen.
pub fn fuzzy_match(index: &NameIndex, raw_name: &str, threshold: f64) -> Option<FuzzyMatch> {
    let target = normalize_name(raw_name);
    let mut best: Option<FuzzyMatch> = None;

    for (idx, key) in index.keys.iter().enumerate() {
        let score = similarity(&target, key);
        if score < threshold {
            continue;
        }
        match best {
            Some(b) if score <= b.score => {}
            _ => best = Some(FuzzyMatch { index: idx, score }),
        }
    }

    best
}

/// Similarity ratio `2 * LCS / (len(a) + len(b))` over characters, where LCS
/// is the longest common subsequence. Symmetric, in `[0, 1]`, and 1.0 for
/// identical strings (including two empty strings).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}
