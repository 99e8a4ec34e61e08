// SQLite snapshot cache.
//
// Holds the last Sleeper snapshot as one JSON document so repeated exports
// don't refetch the ~5 MB player universe.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use tracing::{info, warn};

use crate::sleeper::{fetch_snapshot, SleeperApi};
use crate::snapshot::{FetchRequest, Snapshot, SnapshotMetadata};

/// Row key of the cached snapshot.
const SNAPSHOT_KEY: &str = "sleeper_snapshot";

const CACHE_FILE: &str = "sleeper_cache.db";

/// `<platform cache dir>/sleeper_cache.db`, when the platform has one.
pub fn default_cache_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "adpmerge").map(|dirs| dirs.cache_dir().join(CACHE_FILE))
}

/// Summary of what the cache holds.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    pub path: String,
    /// Size of the stored JSON document in bytes.
    pub bytes: u64,
    pub saved_at: Option<DateTime<Utc>>,
    /// `None` when the stored document cannot be read.
    pub metadata: Option<SnapshotMetadata>,
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Cache,
    Api,
}

pub struct SnapshotCache {
    conn: Mutex<Connection>,
    path: String,
}

impl SnapshotCache {
    /// Open (or create) the cache at `path`. Pass `":memory:"` for a
    /// throwaway cache.
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create cache directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open cache database at {path}"))?;

        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;

             CREATE TABLE IF NOT EXISTS snapshot_cache (
                 key      TEXT PRIMARY KEY,
                 value    TEXT NOT NULL,
                 saved_at TEXT NOT NULL
             );",
        )
        .context("failed to create cache schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `snapshot`, replacing any previous one.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).context("failed to serialize snapshot")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO snapshot_cache (key, value, saved_at) VALUES (?1, ?2, ?3)",
                params![SNAPSHOT_KEY, json, Utc::now().to_rfc3339()],
            )
            .context("failed to save snapshot")?;
        info!("Saved snapshot to cache at {}", self.path);
        Ok(())
    }

    /// The cached snapshot, if any. A stored document that no longer
    /// deserializes is reported and treated as absent.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let Some(json) = self.raw_value()? else {
            return Ok(None);
        };
        match serde_json::from_str::<Snapshot>(&json) {
            Ok(snapshot) => {
                info!(
                    "Loaded cached snapshot (fetched {})",
                    snapshot.metadata.fetched_at
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                warn!("Ignoring unreadable cached snapshot: {e}");
                Ok(None)
            }
        }
    }

    /// Drop the cached snapshot. Returns whether there was one.
    pub fn clear(&self) -> Result<bool> {
        let removed = self
            .conn()
            .execute(
                "DELETE FROM snapshot_cache WHERE key = ?1",
                params![SNAPSHOT_KEY],
            )
            .context("failed to clear cache")?;
        Ok(removed > 0)
    }

    pub fn info(&self) -> Result<Option<CacheInfo>> {
        let row = self
            .conn()
            .query_row(
                "SELECT value, length(CAST(value AS BLOB)), saved_at
                 FROM snapshot_cache WHERE key = ?1",
                params![SNAPSHOT_KEY],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .context("failed to read cache info")?;

        let Some((json, bytes, saved_at)) = row else {
            return Ok(None);
        };

        #[derive(Deserialize)]
        struct MetadataOnly {
            metadata: SnapshotMetadata,
        }

        Ok(Some(CacheInfo {
            path: self.path.clone(),
            bytes: u64::try_from(bytes).unwrap_or(0),
            saved_at: DateTime::parse_from_rfc3339(&saved_at)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            metadata: serde_json::from_str::<MetadataOnly>(&json)
                .ok()
                .map(|m| m.metadata),
        }))
    }

    fn raw_value(&self) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM snapshot_cache WHERE key = ?1",
                params![SNAPSHOT_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query cached snapshot")
    }
}

/// Serve `request` from the cache when allowed and the cached snapshot covers
/// it; otherwise fetch from the API and refresh the cache. A failed cache
/// write is logged, not fatal.
pub async fn get_data(
    api: &dyn SleeperApi,
    cache: Option<&SnapshotCache>,
    request: &FetchRequest,
    use_cache: bool,
) -> Result<(Snapshot, DataOrigin)> {
    if let (Some(cache), true) = (cache, use_cache) {
        match cache.load() {
            Ok(Some(snapshot)) if snapshot.metadata.covers(request) => {
                return Ok((snapshot, DataOrigin::Cache));
            }
            Ok(Some(_)) => info!("Cached snapshot does not cover this request, fetching"),
            Ok(None) => info!("No cached snapshot, fetching"),
            Err(e) => warn!("Cache read failed, fetching: {e:#}"),
        }
    }

    let snapshot = fetch_snapshot(api, request)
        .await
        .context("failed to fetch data from Sleeper")?;

    if let Some(cache) = cache {
        if let Err(e) = cache.save(&snapshot) {
            warn!("Failed to save snapshot to cache: {e:#}");
        }
    }

    Ok((snapshot, DataOrigin::Api))
}
