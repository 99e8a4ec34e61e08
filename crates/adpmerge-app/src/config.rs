// Configuration loading and validation (config/adpmerge.toml).

use adpmerge_core::matching::DEFAULT_FUZZY_THRESHOLD;
use adpmerge_core::ranking::{ColumnMap, RankingSource};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the configuration inside `config/`.
pub const CONFIG_FILE: &str = "adpmerge.toml";

/// Last regular-season week Sleeper serves matchups for.
pub const MAX_WEEK: u32 = 18;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `config/`; relative paths resolve against it.
    pub base_dir: PathBuf,
    pub sleeper: SleeperConfig,
    pub cache: CacheConfig,
    pub merge: MergeConfig,
    pub rankings: RankingsConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Resolve a configured path against `base_dir` unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Cache database location: the configured path, else the platform
    /// cache directory.
    pub fn cache_path(&self) -> Option<PathBuf> {
        match &self.cache.path {
            Some(p) => Some(self.resolve(p)),
            None => crate::cache::default_cache_path(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }
}

// ---------------------------------------------------------------------------
// adpmerge.toml sections
// ---------------------------------------------------------------------------

/// Raw deserialization target for the whole file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    sleeper: SleeperConfig,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    merge: MergeConfig,
    #[serde(default)]
    rankings: RankingsConfig,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleeperConfig {
    pub base_url: String,
    /// League to export. When absent only the player universe is fetched.
    #[serde(default)]
    pub league_id: Option<String>,
    #[serde(default = "default_true")]
    pub include_players: bool,
    /// Weeks whose matchups are exported.
    #[serde(default)]
    pub weeks: Vec<u32>,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingsConfig {
    /// Merged in this order.
    #[serde(default)]
    pub sources: Vec<RankingSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingSourceConfig {
    pub key: String,
    pub label: String,
    pub path: String,
    #[serde(default)]
    pub columns: ColumnMap,
}

impl RankingSourceConfig {
    pub fn source(&self) -> RankingSource {
        RankingSource {
            key: self.key.clone(),
            label: self.label.clone(),
            columns: self.columns.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default)]
    pub workbook: Option<String>,
    #[serde(default = "default_true")]
    pub export_unmatched: bool,
    #[serde(default)]
    pub players_csv: bool,
    #[serde(default = "default_true")]
    pub metadata_sheet: bool,
    /// Shade Players rows by position.
    #[serde(default = "default_true")]
    pub position_colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
            workbook: None,
            export_unmatched: true,
            players_csv: false,
            metadata_sheet: true,
            position_colors: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

fn default_output_dir() -> String {
    "output".into()
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Read and validate `config/adpmerge.toml` under `base_dir` without touching
/// `defaults/`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    let file: ConfigFile =
        toml::from_str(&text).map_err(|e| ConfigError::ParseError { path, source: e })?;

    let config = Config {
        base_dir: base_dir.to_path_buf(),
        sleeper: file.sleeper,
        cache: file.cache,
        merge: file.merge,
        rankings: file.rankings,
        output: file.output,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every file in `defaults/` that is missing from `config/`. Returns the
/// copied paths; existing config files are never overwritten.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither defaults/ nor config/ found in {}",
                base_dir.display()
            ),
        });
    }

    let copy_err = |message: String| ConfigError::DefaultsCopyError { message };

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_err(format!("failed to create config directory: {e}")))?;
    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_err(format!("failed to read defaults directory: {e}")))?;

    let mut copied = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| copy_err(format!("failed to read defaults entry: {e}")))?
            .path();
        let Some(file_name) = path.file_name().filter(|_| path.is_file()) else {
            continue;
        };
        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&path, &target)
            .map_err(|e| copy_err(format!("failed to copy {}: {e}", path.display())))?;
        copied.push(target);
    }

    Ok(copied)
}

/// Seed `config/` from `defaults/` if needed, then load.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let sleeper = &config.sleeper;
    if !(sleeper.base_url.starts_with("http://") || sleeper.base_url.starts_with("https://")) {
        return Err(invalid(
            "sleeper.base_url",
            format!("must be an http(s) URL, got {:?}", sleeper.base_url),
        ));
    }

    if let Some(id) = &sleeper.league_id {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(
                "sleeper.league_id",
                format!("must be a numeric Sleeper id, got {id:?}"),
            ));
        }
    }

    if let Some(week) = sleeper.weeks.iter().find(|w| !(1..=MAX_WEEK).contains(*w)) {
        return Err(invalid(
            "sleeper.weeks",
            format!("weeks must be between 1 and {MAX_WEEK}, got {week}"),
        ));
    }

    if sleeper.timeout_secs == 0 {
        return Err(invalid("sleeper.timeout_secs", "must be greater than 0"));
    }

    let t = config.merge.fuzzy_threshold;
    if !(t > 0.0 && t <= 1.0) {
        return Err(invalid(
            "merge.fuzzy_threshold",
            format!("must be in (0, 1], got {t}"),
        ));
    }

    let mut seen = HashSet::new();
    for (i, source) in config.rankings.sources.iter().enumerate() {
        let field = |name: &str| format!("rankings.sources[{i}].{name}");
        if source.key.is_empty()
            || !source
                .key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid(
                field("key"),
                format!("must be non-empty and alphanumeric, got {:?}", source.key),
            ));
        }
        if !seen.insert(source.key.as_str()) {
            return Err(invalid(
                field("key"),
                format!("duplicate source key {:?}", source.key),
            ));
        }
        if source.path.trim().is_empty() {
            return Err(invalid(field("path"), "must not be empty"));
        }
    }

    if config.output.dir.trim().is_empty() {
        return Err(invalid("output.dir", "must not be empty"));
    }
    if let Some(name) = &config.output.workbook {
        if !name.ends_with(".xlsx") {
            return Err(invalid(
                "output.workbook",
                format!("must end in .xlsx, got {name:?}"),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
