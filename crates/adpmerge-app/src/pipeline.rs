// Export pipeline.
//
// Order of work:
// 1. Load the snapshot (cache or API)
// 2. Filter the player universe down to fantasy-relevant players
// 3. Load ranking tables and merge them into the roster
// 4. Write unmatched CSVs (and the players CSV when enabled)
// 5. Build the league sheets and write the workbook

use std::path::{Path, PathBuf};

use adpmerge_core::events::TracingSink;
use adpmerge_core::filter::{filter_players, FilterStats};
use adpmerge_core::merge::{merge_rankings, MatchStatistics, MergeOptions};
use adpmerge_core::ranking::{load_ranking_table, RankingSource};
use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::cache::{get_data, DataOrigin, SnapshotCache};
use crate::config::Config;
use crate::export::{
    metadata_table, players_table, records_table, rosters_table, summary_table,
    unmatched_file_name, write_table_csv, write_unmatched_csv, write_workbook, SheetTable,
    WorkbookOptions,
};
use crate::league::summarize_rosters;
use crate::sleeper::SleeperApi;
use crate::snapshot::{FetchRequest, Snapshot};

/// Per-run switches that sit outside the config file.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Serve the snapshot from the cache when it covers the request.
    pub use_cache: bool,
    /// Export players without merging any ranking source.
    pub skip_rankings: bool,
    /// Workbook path, overriding `[output]`.
    pub workbook: Option<PathBuf>,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub workbook: PathBuf,
    pub sheets: Vec<String>,
    pub origin: DataOrigin,
    /// `None` when the snapshot holds no player universe.
    pub filter: Option<FilterStats>,
    /// `None` when rankings were skipped or there were no players.
    pub matching: Option<MatchStatistics>,
    pub unmatched_files: Vec<PathBuf>,
    pub players_csv: Option<PathBuf>,
}

/// `<league_id>.xlsx`, or `sleeper_data_<timestamp>.xlsx` without a league.
pub fn default_workbook_name(league_id: Option<&str>, timestamp: &str) -> String {
    match league_id {
        Some(id) => format!("{id}.xlsx"),
        None => format!("sleeper_data_{timestamp}.xlsx"),
    }
}

fn workbook_path(config: &Config, options: &ExportOptions, timestamp: &str) -> PathBuf {
    if let Some(path) = &options.workbook {
        return path.clone();
    }
    let name = config.output.workbook.clone().unwrap_or_else(|| {
        default_workbook_name(config.sleeper.league_id.as_deref(), timestamp)
    });
    config.output_dir().join(name)
}

/// Sibling of `workbook` named `name`.
fn beside(workbook: &Path, name: &str) -> PathBuf {
    workbook.with_file_name(name)
}

/// Fetch, merge and write one export.
pub async fn run_export(
    config: &Config,
    api: &dyn SleeperApi,
    cache: Option<&SnapshotCache>,
    options: &ExportOptions,
) -> Result<ExportReport> {
    let request = FetchRequest {
        league_id: config.sleeper.league_id.clone(),
        include_players: config.sleeper.include_players,
        weeks: config.sleeper.weeks.clone(),
    };
    let (snapshot, origin) = get_data(api, cache, &request, options.use_cache).await?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let workbook = workbook_path(config, options, &timestamp);
    let base = workbook
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".into());

    let mut report = ExportReport {
        workbook: workbook.clone(),
        sheets: Vec::new(),
        origin,
        filter: None,
        matching: None,
        unmatched_files: Vec::new(),
        players_csv: None,
    };
    let mut sheets: Vec<SheetTable> = Vec::new();

    if let Some(players) = players_sheet(config, options, &snapshot, &workbook, &base, &timestamp, &mut report)? {
        sheets.push(players);
    }
    sheets.extend(league_sheets(&snapshot));
    if config.output.metadata_sheet {
        sheets.push(metadata_table(&snapshot.metadata));
    }
    if sheets.is_empty() {
        warn!("Nothing to export; writing a summary sheet");
        sheets.push(summary_table(&snapshot));
    }

    write_workbook(
        &workbook,
        &sheets,
        WorkbookOptions {
            position_colors: config.output.position_colors,
        },
    )
    .with_context(|| format!("failed to write workbook {}", workbook.display()))?;

    report.sheets = sheets.into_iter().map(|s| s.name).collect();
    Ok(report)
}

/// Filter, merge and tabulate the player universe. `None` when the snapshot
/// carries no players.
fn players_sheet(
    config: &Config,
    options: &ExportOptions,
    snapshot: &Snapshot,
    workbook: &Path,
    base: &str,
    timestamp: &str,
    report: &mut ExportReport,
) -> Result<Option<SheetTable>> {
    let Some(universe) = snapshot.players.as_ref().filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let mut sink = TracingSink;
    let positions = snapshot.roster_positions();
    let filtered = filter_players(universe, positions.as_deref(), &mut sink);
    let stats = &filtered.stats;
    info!(
        "Filtered {} players down to {} ({:.1}% reduction; {} inactive, {} duplicate names, \
         {} without fantasy positions, {} with invalid positions, {} data errors)",
        stats.processed,
        stats.kept,
        stats.reduction_pct(),
        stats.inactive,
        stats.duplicate_name,
        stats.no_fantasy_position,
        stats.invalid_fantasy_position,
        stats.data_errors,
    );
    report.filter = Some(filtered.stats.clone());

    if config.output.players_csv {
        let path = beside(workbook, &format!("{base}_players_{timestamp}.csv"));
        write_table_csv(&path, &players_table(&filtered.roster, &[]))
            .with_context(|| format!("failed to write players CSV {}", path.display()))?;
        info!("Wrote players CSV to {}", path.display());
        report.players_csv = Some(path);
    }

    if options.skip_rankings || config.rankings.sources.is_empty() {
        info!("Skipping ranking merge");
        return Ok(Some(players_table(&filtered.roster, &[])));
    }

    let mut tables = Vec::with_capacity(config.rankings.sources.len());
    for source_config in &config.rankings.sources {
        let path = config.resolve(&source_config.path);
        let table = load_ranking_table(&path, source_config.source()).with_context(|| {
            format!("failed to load {} rankings", source_config.label)
        })?;
        info!("Loaded {} {} rankings from {}", table.len(), source_config.label, path.display());
        tables.push(table);
    }

    let merge_options = MergeOptions {
        fuzzy_threshold: config.merge.fuzzy_threshold,
    };
    let outcome = merge_rankings(filtered.roster, &tables, &merge_options, &mut sink);

    for source in &outcome.stats.sources {
        if let Some(reason) = &source.skipped {
            warn!("{} rankings skipped: {reason}", source.label);
            continue;
        }
        info!(
            "{}: {}/{} matched ({:.1}%; {} exact, {} fuzzy, {} unmatched)",
            source.label,
            source.matched(),
            source.total,
            source.match_rate_pct(),
            source.exact_matched,
            source.fuzzy_matched,
            source.unmatched.len(),
        );

        if config.output.export_unmatched && !source.unmatched.is_empty() {
            let path = beside(workbook, &unmatched_file_name(base, &source.key, timestamp));
            write_unmatched_csv(&path, &source.unmatched).with_context(|| {
                format!("failed to write unmatched {} rows", source.label)
            })?;
            info!("Wrote {} unmatched rows to {}", source.unmatched.len(), path.display());
            report.unmatched_files.push(path);
        }
    }
    info!(
        "{} of {} players carry rankings",
        outcome.stats.players_with_rankings, outcome.stats.roster_size
    );

    let sources: Vec<RankingSource> = tables.into_iter().map(|t| t.source).collect();
    let sheet = players_table(&outcome.roster, &sources);
    report.matching = Some(outcome.stats);
    Ok(Some(sheet))
}

/// League_Info, Users, Rosters and one sheet per matchup week, each only
/// when the snapshot has data for it.
fn league_sheets(snapshot: &Snapshot) -> Vec<SheetTable> {
    let mut sheets = Vec::new();

    if let Some(info) = snapshot.league_info.as_ref().filter(|v| !v.is_null()) {
        sheets.push(records_table("League_Info", std::slice::from_ref(info)));
    }

    let users = snapshot.users.as_deref().unwrap_or_default();
    if !users.is_empty() {
        sheets.push(records_table("Users", users));
    }

    if let Some(rosters) = snapshot.rosters.as_deref().filter(|r| !r.is_empty()) {
        sheets.push(rosters_table(&summarize_rosters(rosters, users)));
    }

    for (week, matchups) in &snapshot.matchups {
        if !matchups.is_empty() {
            sheets.push(records_table(&format!("Week_{week}_Matchups"), matchups));
        }
    }

    sheets
}
