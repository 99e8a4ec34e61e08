// adpmerge entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (log file plus stderr)
// 3. Load config, apply command-line overrides
// 4. Open the snapshot cache
// 5. Run the selected command

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use adpmerge_app::cache::{DataOrigin, SnapshotCache};
use adpmerge_app::config::{self, Config, MAX_WEEK};
use adpmerge_app::pipeline::{run_export, ExportOptions};
use adpmerge_app::sleeper::{validate_league_id, SleeperClient};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "adpmerge", version, about = "Export a Sleeper league with merged ADP rankings")]
struct Cli {
    /// Directory holding config/ and defaults/; relative paths resolve here.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// League to export, overriding the config file.
    #[arg(long, value_parser = parse_league_id)]
    league_id: Option<String>,

    /// Always fetch from the API.
    #[arg(long)]
    no_cache: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, merge and write the workbook (default).
    Export(ExportArgs),
    /// Show what the snapshot cache holds.
    CacheInfo,
    /// Delete the cached snapshot.
    ClearCache,
    /// Check that a league id exists.
    ValidateLeague { league_id: String },
}

#[derive(Debug, Default, clap::Args)]
struct ExportArgs {
    /// Workbook path, overriding the config file.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Matchup weeks to fetch, e.g. `--weeks 1,2,3`.
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..=MAX_WEEK as i64))]
    weeks: Option<Vec<u32>>,

    /// Skip the player universe.
    #[arg(long)]
    no_players: bool,

    /// Export players without merging rankings.
    #[arg(long)]
    skip_rankings: bool,
}

fn parse_league_id(s: &str) -> Result<String, String> {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        Ok(s.to_string())
    } else {
        Err(format!("`{s}` is not a numeric Sleeper league id"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.base_dir)?;
    info!("adpmerge {} starting", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&cli.base_dir).context("failed to load configuration")?;
    if let Some(league_id) = &cli.league_id {
        config.sleeper.league_id = Some(league_id.clone());
    }

    match cli.command.unwrap_or(Command::Export(ExportArgs::default())) {
        Command::Export(args) => export(config, args, !cli.no_cache).await,
        Command::CacheInfo => cache_info(&config),
        Command::ClearCache => clear_cache(&config),
        Command::ValidateLeague { league_id } => {
            let league_id = parse_league_id(&league_id).map_err(anyhow::Error::msg)?;
            let client = SleeperClient::from_config(&config.sleeper);
            if validate_league_id(&client, &league_id)
                .await
                .context("failed to reach Sleeper")?
            {
                println!("League {league_id} found");
                Ok(())
            } else {
                bail!("league {league_id} does not exist")
            }
        }
    }
}

async fn export(mut config: Config, args: ExportArgs, use_cache: bool) -> anyhow::Result<()> {
    if let Some(weeks) = args.weeks {
        config.sleeper.weeks = weeks;
    }
    if args.no_players {
        config.sleeper.include_players = false;
    }

    let cache = open_cache(&config);
    let client = SleeperClient::from_config(&config.sleeper);
    let options = ExportOptions {
        use_cache: use_cache && cache.is_some(),
        skip_rankings: args.skip_rankings,
        workbook: args.output,
    };

    let report = run_export(&config, &client, cache.as_ref(), &options).await?;

    let origin = match report.origin {
        DataOrigin::Cache => "cache",
        DataOrigin::Api => "Sleeper API",
    };
    println!("Wrote {} (data from {origin})", report.workbook.display());
    println!("  sheets: {}", report.sheets.join(", "));
    if let Some(filter) = &report.filter {
        println!(
            "  players: {} of {} kept ({:.1}% filtered out)",
            filter.kept,
            filter.processed,
            filter.reduction_pct()
        );
    }
    if let Some(stats) = &report.matching {
        for source in &stats.sources {
            match &source.skipped {
                Some(reason) => println!("  {}: skipped ({reason})", source.label),
                None => println!(
                    "  {}: {}/{} matched ({:.1}%), {} exact, {} fuzzy",
                    source.label,
                    source.matched(),
                    source.total,
                    source.match_rate_pct(),
                    source.exact_matched,
                    source.fuzzy_matched
                ),
            }
        }
    }
    for path in report.unmatched_files.iter().chain(&report.players_csv) {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

/// The configured cache, or `None` when disabled or unavailable.
fn open_cache(config: &Config) -> Option<SnapshotCache> {
    if !config.cache.enabled {
        return None;
    }
    let Some(path) = config.cache_path() else {
        warn!("No cache directory available on this platform; caching disabled");
        return None;
    };
    match SnapshotCache::open(&path.to_string_lossy()) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Cache unavailable, continuing without it: {e:#}");
            None
        }
    }
}

fn require_cache(config: &Config) -> anyhow::Result<SnapshotCache> {
    if !config.cache.enabled {
        bail!("the cache is disabled in the configuration");
    }
    let path = config
        .cache_path()
        .context("no cache directory available on this platform")?;
    SnapshotCache::open(&path.to_string_lossy()).context("failed to open cache")
}

fn cache_info(config: &Config) -> anyhow::Result<()> {
    let cache = require_cache(config)?;
    match cache.info()? {
        None => println!("Cache at {} is empty", cache.path()),
        Some(info) => {
            println!("Cache: {}", info.path);
            println!("  size: {:.1} KB", info.bytes as f64 / 1024.0);
            if let Some(saved_at) = info.saved_at {
                println!("  saved: {saved_at}");
            }
            match info.metadata {
                Some(meta) => {
                    println!("  fetched: {}", meta.fetched_at);
                    println!("  league: {}", meta.league_id.as_deref().unwrap_or("(none)"));
                    println!("  players included: {}", meta.included_players);
                    let weeks: Vec<String> = meta.weeks.iter().map(u32::to_string).collect();
                    println!("  weeks: {}", weeks.join(", "));
                }
                None => println!("  stored snapshot is unreadable"),
            }
        }
    }
    Ok(())
}

fn clear_cache(config: &Config) -> anyhow::Result<()> {
    let cache = require_cache(config)?;
    if cache.clear()? {
        println!("Cleared cached snapshot at {}", cache.path());
    } else {
        println!("Cache at {} was already empty", cache.path());
    }
    Ok(())
}

/// Log to `logs/adpmerge.log` under `base_dir`, mirroring warnings to stderr.
fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("adpmerge.log"))?;
    let writer = Mutex::new(log_file).and(std::io::stderr.with_max_level(tracing::Level::WARN));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("adpmerge=info,adpmerge_app=info,adpmerge_core=info,warn")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
