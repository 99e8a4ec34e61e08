// Ranking CSV loading.
//
// Each provider (FFPC, Underdog, ...) ships its own column naming. A
// `ColumnMap` translates provider headers into the fields the merge needs.
// Loading a table only reads records; projecting them into `RankingRow`s is
// deferred to the merge so a malformed table skips one source instead of
// aborting the run.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The four metrics a ranking source contributes to a roster entry. Applied
/// as one unit: a roster entry either carries all of them for a source or
/// none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingFields {
    pub adp: Option<f64>,
    pub rank: Option<f64>,
    pub delta: Option<f64>,
    pub pos_rank: Option<String>,
}

impl RankingFields {
    /// True when the row carried no usable metric at all.
    pub fn is_absent(&self) -> bool {
        self.adp.is_none() && self.rank.is_none() && self.delta.is_none() && self.pos_rank.is_none()
    }
}

/// One row of a ranking source.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub name: String,
    pub position: String,
    pub team: String,
    pub fields: RankingFields,
}

/// Header names for one provider's CSV layout. Headers left out of a config
/// table keep their FFPC default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnMap {
    pub name: String,
    pub position: String,
    pub team: String,
    pub adp: String,
    pub rank: String,
    pub delta: String,
    pub pos_rank: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            name: "Name".into(),
            position: "Position".into(),
            team: "Team".into(),
            adp: "ADP".into(),
            rank: "ETR_Rank".into(),
            delta: "Delta".into(),
            pos_rank: "Pos_Rank".into(),
        }
    }
}

/// A configured ranking provider. `key` prefixes the merged output columns
/// (`ffpc_adp`, `ud_adp`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RankingSource {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub columns: ColumnMap,
}

impl RankingSource {
    /// FFPC best-ball layout.
    pub fn ffpc() -> Self {
        RankingSource {
            key: "ffpc".into(),
            label: "FFPC".into(),
            columns: ColumnMap::default(),
        }
    }

    /// Underdog layout: same as FFPC except the position header is `Pos`.
    pub fn underdog() -> Self {
        RankingSource {
            key: "ud".into(),
            label: "Underdog".into(),
            columns: ColumnMap {
                position: "Pos".into(),
                ..ColumnMap::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{source_key} rankings are missing required column `{column}`")]
    MissingColumn { source_key: String, column: String },
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Raw records of one ranking CSV, tagged with their source.
#[derive(Debug, Clone)]
pub struct RankingTable {
    pub source: RankingSource,
    headers: csv::StringRecord,
    records: Vec<csv::StringRecord>,
    /// Parser errors for records that could not be read at all.
    rejected: Vec<String>,
}

/// Resolved header positions for one table.
struct ColumnIndex {
    name: usize,
    position: usize,
    team: usize,
    adp: usize,
    rank: Option<usize>,
    delta: Option<usize>,
    pos_rank: Option<usize>,
}

impl RankingTable {
    /// Read every record from `rdr`. Short or long rows are kept; missing
    /// cells read as blank. Records the parser cannot decode at all (e.g.
    /// invalid UTF-8) are set aside in [`RankingTable::rejected`]. An
    /// unreadable header is an error.
    pub fn from_reader<R: Read>(source: RankingSource, rdr: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(rdr);
        let headers = reader.headers()?.clone();
        let mut records = Vec::new();
        let mut rejected = Vec::new();
        for result in reader.records() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => rejected.push(e.to_string()),
            }
        }
        Ok(RankingTable {
            source,
            headers,
            records,
            rejected,
        })
    }

    /// Build a table from already-parsed rows. Headers follow the source's
    /// column map.
    pub fn from_rows(source: RankingSource, rows: &[RankingRow]) -> Self {
        let c = &source.columns;
        let headers = csv::StringRecord::from(vec![
            c.name.as_str(),
            c.position.as_str(),
            c.team.as_str(),
            c.adp.as_str(),
            c.rank.as_str(),
            c.delta.as_str(),
            c.pos_rank.as_str(),
        ]);
        let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let records = rows
            .iter()
            .map(|r| {
                csv::StringRecord::from(vec![
                    r.name.clone(),
                    r.position.clone(),
                    r.team.clone(),
                    fmt(r.fields.adp),
                    fmt(r.fields.rank),
                    fmt(r.fields.delta),
                    r.fields.pos_rank.clone().unwrap_or_default(),
                ])
            })
            .collect();
        RankingTable {
            source,
            headers,
            records,
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Why each unreadable record was dropped.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Project the records into ranking rows. Fails when one of the
    /// identifying columns (name, position, team) or ADP is missing; rank,
    /// delta and positional rank are optional columns.
    pub fn rows(&self) -> Result<Vec<RankingRow>, RankingError> {
        let index = self.column_index()?;
        fn get(record: &csv::StringRecord, i: usize) -> String {
            record.get(i).unwrap_or("").to_string()
        }
        fn get_opt(record: &csv::StringRecord, i: Option<usize>) -> &str {
            i.and_then(|i| record.get(i)).unwrap_or("")
        }

        Ok(self
            .records
            .iter()
            .map(|record| RankingRow {
                name: get(record, index.name),
                position: get(record, index.position),
                team: get(record, index.team),
                fields: RankingFields {
                    adp: parse_metric(record.get(index.adp).unwrap_or("")),
                    rank: parse_metric(get_opt(record, index.rank)),
                    delta: parse_metric(get_opt(record, index.delta)),
                    pos_rank: Some(get_opt(record, index.pos_rank))
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                },
            })
            .collect())
    }

    fn column_index(&self) -> Result<ColumnIndex, RankingError> {
        let c = &self.source.columns;
        let required = |column: &str| {
            self.find(column).ok_or_else(|| RankingError::MissingColumn {
                source_key: self.source.key.clone(),
                column: column.to_string(),
            })
        };
        Ok(ColumnIndex {
            name: required(&c.name)?,
            position: required(&c.position)?,
            team: required(&c.team)?,
            adp: required(&c.adp)?,
            rank: self.find(&c.rank),
            delta: self.find(&c.delta),
            pos_rank: self.find(&c.pos_rank),
        })
    }

    /// Header lookup: exact first, then case-insensitive.
    fn find(&self, column: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(column)))
    }
}

/// Parse a numeric ranking cell. Blank and placeholder cells ("-", "N/A")
/// become `None`.
fn parse_metric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Path-based loader
// ---------------------------------------------------------------------------

/// Load one provider's ranking CSV. Missing or unreadable files are errors:
/// without the table there is nothing to merge.
pub fn load_ranking_table(path: &Path, source: RankingSource) -> Result<RankingTable, RankingError> {
    let file = std::fs::File::open(path).map_err(|e| RankingError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    RankingTable::from_reader(source, file).map_err(|e| RankingError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
