// Sleeper REST API client.
//
// All reads go through the `SleeperApi` trait so the export pipeline can be
// driven by an in-memory fake in tests. Requests are issued one at a time
// with a fixed pause after each.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SleeperConfig;
use crate::snapshot::{FetchRequest, Snapshot};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SleeperError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{endpoint} returned an unexpected payload: {message}")]
    Payload { endpoint: String, message: String },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read access to the Sleeper API. `endpoint` is relative to the API root,
/// e.g. `players/nfl` or `league/123/rosters`.
#[async_trait]
pub trait SleeperApi: Send + Sync {
    async fn get_json(&self, endpoint: &str) -> Result<Value, SleeperError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

pub struct SleeperClient {
    http: reqwest::Client,
    base_url: String,
    request_delay: Duration,
}

impl SleeperClient {
    pub fn new(base_url: &str, timeout: Duration, request_delay: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("adpmerge/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        SleeperClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_delay,
        }
    }

    pub fn from_config(config: &SleeperConfig) -> Self {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            Duration::from_millis(config.request_delay_ms),
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl SleeperApi for SleeperClient {
    async fn get_json(&self, endpoint: &str) -> Result<Value, SleeperError> {
        let url = self.url(endpoint);
        debug!("GET {url}");

        let http_err = |source| SleeperError::Http {
            endpoint: endpoint.to_string(),
            source,
        };
        let response = self.http.get(&url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SleeperError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.json::<Value>().await.map_err(http_err)?;

        tokio::time::sleep(self.request_delay).await;
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

fn expect_array(endpoint: &str, value: Value) -> Result<Vec<Value>, SleeperError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(SleeperError::Payload {
            endpoint: endpoint.to_string(),
            message: format!("expected a list, got {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Whether `league_id` names an existing league. Sleeper answers unknown ids
/// with HTTP 200 and a `null` body, or with a 404.
pub async fn validate_league_id(
    api: &dyn SleeperApi,
    league_id: &str,
) -> Result<bool, SleeperError> {
    match api.get_json(&format!("league/{league_id}")).await {
        Ok(Value::Object(_)) => Ok(true),
        Ok(_) => Ok(false),
        Err(SleeperError::Status { status, .. }) if (400..500).contains(&status) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Fetch everything `request` asks for, in a fixed order: players, league,
/// users, rosters, then each week's matchups.
pub async fn fetch_snapshot(
    api: &dyn SleeperApi,
    request: &FetchRequest,
) -> Result<Snapshot, SleeperError> {
    info!("Fetching data from the Sleeper API");
    let mut snapshot = Snapshot::empty(request, Utc::now());

    if request.include_players {
        let endpoint = "players/nfl";
        snapshot.players = match api.get_json(endpoint).await? {
            Value::Object(map) => Some(map),
            other => {
                return Err(SleeperError::Payload {
                    endpoint: endpoint.into(),
                    message: format!("expected an object, got {}", kind(&other)),
                })
            }
        };
        info!(
            "Fetched {} NFL players",
            snapshot.players.as_ref().map_or(0, |p| p.len())
        );
    }

    if let Some(league_id) = &request.league_id {
        let league = api.get_json(&format!("league/{league_id}")).await?;
        snapshot.league_info = (!league.is_null()).then_some(league);

        let endpoint = format!("league/{league_id}/users");
        snapshot.users = Some(expect_array(&endpoint, api.get_json(&endpoint).await?)?);

        let endpoint = format!("league/{league_id}/rosters");
        snapshot.rosters = Some(expect_array(&endpoint, api.get_json(&endpoint).await?)?);

        for &week in &request.weeks {
            let endpoint = format!("league/{league_id}/matchups/{week}");
            let matchups = expect_array(&endpoint, api.get_json(&endpoint).await?)?;
            if matchups.is_empty() {
                warn!("No matchups returned for week {week}");
                continue;
            }
            snapshot.matchups.insert(week, matchups);
        }
    } else if !request.weeks.is_empty() {
        warn!("Matchup weeks requested without a league id; skipping matchups");
    }

    Ok(snapshot)
}
