// Spreadsheet and CSV output.
//
// Every sheet is first assembled as a plain `SheetTable`, then written in
// one pass. Keeping the tables as data lets tests check sheet contents
// without opening the .xlsx.

use std::path::{Path, PathBuf};

use adpmerge_core::merge::UnmatchedRow;
use adpmerge_core::player::RosterEntry;
use adpmerge_core::ranking::RankingSource;
use rust_xlsxwriter::{Color, ConditionalFormatFormula, Format, Workbook, XlsxError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::league::{RosterSummary, ROSTER_COLUMNS};
use crate::snapshot::{Snapshot, SnapshotMetadata};

/// Widest a fitted column gets, in characters.
const MAX_COLUMN_WIDTH: usize = 50;
const COLUMN_PADDING: usize = 2;
/// Room for the autofilter drop-down arrow.
const FILTER_PADDING: usize = 3;

const PLAYERS_SHEET: &str = "Players";

/// Row shading for the Players sheet.
const POSITION_COLORS: &[(&str, u32)] = &[
    ("QB", 0xFFCCCB),
    ("RB", 0xC8E6C9),
    ("WR", 0xBBDEFB),
    ("TE", 0xFFE0B2),
    ("K", 0xE1BEE7),
    ("DEF", 0xEEEEEE),
    ("DST", 0xEEEEEE),
];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("workbook error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("failed to write {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("sheet `{sheet}` is too large for a worksheet")]
    TooLarge { sheet: String },
}

// ---------------------------------------------------------------------------
// Sheet model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    fn number(v: Option<f64>) -> Self {
        match v {
            Some(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Empty,
        }
    }

    /// Flatten a JSON value into one cell. Nested lists and objects are kept
    /// as compact JSON text.
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::number(n.as_f64()),
            Value::String(s) => Cell::text(s.as_str()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// The cell as it would read in a CSV.
    fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

/// One worksheet's worth of data.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        SheetTable {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Data sheets get an autofilter and a frozen header row.
    pub fn is_filterable(&self) -> bool {
        let data_sheet = ["Players", "Users", "Rosters"].contains(&self.name.as_str())
            || (self.name.starts_with("Week_") && self.name.ends_with("_Matchups"));
        data_sheet && !self.rows.is_empty() && !self.headers.is_empty()
    }

    /// Column widths fitted to the longest header or value.
    pub fn column_widths(&self) -> Vec<usize> {
        let padding = COLUMN_PADDING + if self.is_filterable() { FILTER_PADDING } else { 0 };
        (0..self.headers.len())
            .map(|c| {
                let longest = std::iter::once(self.headers[c].chars().count())
                    .chain(
                        self.rows
                            .iter()
                            .filter_map(|row| row.get(c))
                            .map(|cell| cell.render().chars().count()),
                    )
                    .max()
                    .unwrap_or(0);
                (longest + padding).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Sheet builders
// ---------------------------------------------------------------------------

const PLAYER_COLUMNS: &[&str] = &[
    "player_id",
    "full_name",
    "position",
    "team",
    "age",
    "height_inches",
    "weight_lbs",
    "years_exp",
    "college",
    "status",
    "fantasy_positions",
];

const RANKING_SUFFIXES: &[&str] = &["adp", "rank", "delta", "pos_rank"];

/// The Players sheet: one row per roster entry, then four ranking columns
/// per source in `sources` order.
pub fn players_table(roster: &[RosterEntry], sources: &[RankingSource]) -> SheetTable {
    let mut headers: Vec<String> = PLAYER_COLUMNS.iter().map(|c| c.to_string()).collect();
    for source in sources {
        headers.extend(RANKING_SUFFIXES.iter().map(|s| format!("{}_{s}", source.key)));
    }

    let mut table = SheetTable::new(PLAYERS_SHEET, headers);
    for p in roster {
        let id = match p.player_id {
            Some(id) => Cell::Number(id as f64),
            None => Cell::text(p.sleeper_id.as_str()),
        };
        let mut row = vec![
            id,
            Cell::text(p.full_name.as_str()),
            Cell::text(p.position.as_str()),
            Cell::text(p.team.as_str()),
            Cell::number(p.age),
            Cell::number(p.height_inches),
            Cell::number(p.weight_lbs),
            Cell::number(p.years_exp),
            Cell::text(p.college.as_str()),
            Cell::text(p.status.as_str()),
            Cell::text(p.fantasy_positions.join(", ")),
        ];
        for source in sources {
            match p.ranking(&source.key) {
                Some(f) => row.extend([
                    Cell::number(f.adp),
                    Cell::number(f.rank),
                    Cell::number(f.delta),
                    Cell::text(f.pos_rank.clone().unwrap_or_default()),
                ]),
                None => row.extend(std::iter::repeat(Cell::Empty).take(RANKING_SUFFIXES.len())),
            }
        }
        table.rows.push(row);
    }
    table
}

/// A sheet with one row per JSON record and one column per key seen, in
/// first-seen order. Non-object records land in a `value` column.
pub fn records_table(name: &str, records: &[Value]) -> SheetTable {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        match record {
            Value::Object(map) => {
                for key in map.keys() {
                    if !headers.iter().any(|h| h == key) {
                        headers.push(key.clone());
                    }
                }
            }
            _ => {
                if !headers.iter().any(|h| h == "value") {
                    headers.push("value".into());
                }
            }
        }
    }

    let mut table = SheetTable::new(name, headers);
    for record in records {
        let row = table
            .headers
            .iter()
            .map(|h| match record {
                Value::Object(map) => map.get(h).map(Cell::from_json).unwrap_or(Cell::Empty),
                other if h == "value" => Cell::from_json(other),
                _ => Cell::Empty,
            })
            .collect();
        table.rows.push(row);
    }
    table
}

pub fn rosters_table(summaries: &[RosterSummary]) -> SheetTable {
    let headers = ROSTER_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut table = SheetTable::new("Rosters", headers);
    for r in summaries {
        table.rows.push(vec![
            Cell::number(r.roster_id.map(|id| id as f64)),
            Cell::text(r.owner_id.as_str()),
            Cell::text(r.owner_name.as_str()),
            Cell::Number(r.wins as f64),
            Cell::Number(r.losses as f64),
            Cell::Number(r.ties as f64),
            Cell::number(Some(r.fpts)),
            Cell::number(Some(r.fpts_against)),
            Cell::Number(r.total_moves as f64),
            Cell::Number(r.waiver_position as f64),
            Cell::text(r.players.as_str()),
        ]);
    }
    table
}

pub fn metadata_table(meta: &SnapshotMetadata) -> SheetTable {
    let headers = ["fetched_at", "league_id", "included_players", "weeks"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut table = SheetTable::new("Metadata", headers);
    let weeks: Vec<String> = meta.weeks.iter().map(u32::to_string).collect();
    table.rows.push(vec![
        Cell::text(meta.fetched_at.to_rfc3339()),
        Cell::text(meta.league_id.clone().unwrap_or_default()),
        Cell::Bool(meta.included_players),
        Cell::text(weeks.join(", ")),
    ]);
    table
}

/// Fallback sheet listing which data sections the snapshot holds.
pub fn summary_table(snapshot: &Snapshot) -> SheetTable {
    let headers = vec!["Data Available".to_string(), "Status".to_string()];
    let mut table = SheetTable::new("Summary", headers);
    for (section, available) in snapshot.sections() {
        let status = if available { "Available" } else { "Empty" };
        table.rows.push(vec![Cell::text(section), Cell::text(status)]);
    }
    table
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookOptions {
    pub position_colors: bool,
}

fn row_num(sheet: &str, i: usize) -> Result<u32, ExportError> {
    u32::try_from(i).map_err(|_| ExportError::TooLarge {
        sheet: sheet.to_string(),
    })
}

fn col_num(sheet: &str, i: usize) -> Result<u16, ExportError> {
    u16::try_from(i).map_err(|_| ExportError::TooLarge {
        sheet: sheet.to_string(),
    })
}

/// Write `sheets` to an .xlsx at `path`, creating its directory.
pub fn write_workbook(
    path: &Path,
    sheets: &[SheetTable],
    options: WorkbookOptions,
) -> Result<(), ExportError> {
    ensure_parent(path)?;

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for table in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&table.name)?;

        for (c, header) in table.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col_num(&table.name, c)?, header, &bold)?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            let r = row_num(&table.name, r + 1)?;
            for (c, cell) in row.iter().enumerate() {
                let c = col_num(&table.name, c)?;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        sheet.write_string(r, c, s)?;
                    }
                    Cell::Number(n) => {
                        sheet.write_number(r, c, *n)?;
                    }
                    Cell::Bool(b) => {
                        sheet.write_boolean(r, c, *b)?;
                    }
                }
            }
        }

        let last_row = row_num(&table.name, table.rows.len())?;
        let last_col = col_num(&table.name, table.headers.len().saturating_sub(1))?;

        if table.is_filterable() {
            sheet.autofilter(0, 0, last_row, last_col)?;
            sheet.set_freeze_panes(1, 0)?;
        }

        for (c, width) in table.column_widths().into_iter().enumerate() {
            sheet.set_column_width(col_num(&table.name, c)?, width as f64)?;
        }

        if options.position_colors && table.name == PLAYERS_SHEET && !table.rows.is_empty() {
            if let Some(pos_col) = table.column("position") {
                let letter = column_letter(pos_col);
                for (position, rgb) in POSITION_COLORS {
                    let fill = Format::new().set_background_color(Color::RGB(*rgb));
                    let rule = ConditionalFormatFormula::new()
                        .set_rule(format!("=${letter}2=\"{position}\"").as_str())
                        .set_format(&fill);
                    sheet.add_conditional_format(1, 0, last_row, last_col, &rule)?;
                }
                debug!("applied position shading on column {letter}");
            }
        }

        debug!(
            "wrote sheet {} ({} rows, {} columns)",
            table.name,
            table.rows.len(),
            table.headers.len()
        );
    }

    workbook.save(path)?;
    info!("Wrote {} ({} sheets)", path.display(), sheets.len());
    Ok(())
}

/// Spreadsheet column letters for a zero-based index: 0 -> A, 27 -> AB.
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// `<base>_<key>_unmatched_<timestamp>.csv`
pub fn unmatched_file_name(base: &str, source_key: &str, timestamp: &str) -> String {
    format!("{base}_{source_key}_unmatched_{timestamp}.csv")
}

/// Write one source's unmatched ranking rows for manual review.
pub fn write_unmatched_csv(path: &Path, rows: &[UnmatchedRow]) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| csv_err(csv::Error::from(e)))?;
    Ok(())
}

/// Write a sheet table as CSV.
pub fn write_table_csv(path: &Path, table: &SheetTable) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(Cell::render))
            .map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| csv_err(csv::Error::from(e)))?;
    Ok(())
}
