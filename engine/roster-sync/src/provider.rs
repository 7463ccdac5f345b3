//! External roster provider
//!
//! The provider is authoritative for "who currently holds this player" but
//! eventually consistent; reconciliation treats its answers as the target
//! state to converge the ledger toward.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One team's current player set at the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRoster {
    /// Provider-side roster identifier, matched against
    /// `Team::external_roster_id`
    pub team_external_id: String,
    /// Provider-side player identifiers, matched against
    /// `Player::external_id`
    pub player_ids: HashSet<String>,
}

/// Abstract trait for roster providers
#[async_trait::async_trait]
pub trait RosterProvider: Send + Sync {
    /// Current rosters for one provider-side league
    async fn league_rosters(&self, external_league_id: &str) -> Result<Vec<ProviderRoster>>;
}

/// Configuration for the Sleeper roster provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleeperProviderConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for SleeperProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.sleeper.app/v1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Sleeper API roster payload (only the fields reconciliation needs)
#[derive(Debug, Deserialize)]
struct SleeperRoster {
    roster_id: u32,
    #[serde(default)]
    players: Option<Vec<String>>,
}

/// Roster provider backed by the Sleeper API
#[derive(Debug)]
pub struct SleeperProvider {
    config: SleeperProviderConfig,
    client: reqwest::Client,
}

impl SleeperProvider {
    pub fn new(config: SleeperProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait::async_trait]
impl RosterProvider for SleeperProvider {
    async fn league_rosters(&self, external_league_id: &str) -> Result<Vec<ProviderRoster>> {
        let url = format!("{}/league/{}/rosters", self.config.api_base_url, external_league_id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::Provider(format!(
                "Failed to get rosters for league {}: {}",
                external_league_id,
                response.status()
            )));
        }

        // Sleeper returns null for unknown/empty leagues rather than []
        let body: serde_json::Value = response.json().await?;
        let rosters: Vec<SleeperRoster> = match body {
            serde_json::Value::Null => Vec::new(),
            other => serde_json::from_value(other).map_err(|e| {
                SyncError::Provider(format!("Failed to parse rosters payload: {}", e))
            })?,
        };

        Ok(rosters
            .into_iter()
            .map(|r| ProviderRoster {
                team_external_id: r.roster_id.to_string(),
                player_ids: r.players.unwrap_or_default().into_iter().collect(),
            })
            .collect())
    }
}
