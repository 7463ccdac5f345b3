//! Service configuration management

use roster_sync::{SleeperProviderConfig, SyncSchedulerConfig};
use serde::{Deserialize, Serialize};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub provider: SleeperProviderConfig,
    pub scheduler: SyncSchedulerConfig,
    /// Minutes a fetched roster stays fresh in the cache
    pub roster_cache_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/cap_ledger".to_string(),
            },
            provider: SleeperProviderConfig::default(),
            scheduler: SyncSchedulerConfig::default(),
            roster_cache_ttl_minutes: 4,
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(url) = std::env::var("ROSTER_PROVIDER_URL") {
            config.provider.api_base_url = url;
        }
        if let Ok(minutes) = std::env::var("SYNC_INTERVAL_MINUTES") {
            config.scheduler.interval_minutes = minutes.parse()?;
        }
        if let Ok(secs) = std::env::var("SYNC_RUN_TIMEOUT_SECS") {
            config.scheduler.run_timeout_secs = secs.parse()?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServiceConfig::default();
        assert!(config.scheduler.interval_minutes >= 1);
        assert!(config.roster_cache_ttl_minutes < config.scheduler.interval_minutes as i64 * 2);
        assert!(config.provider.api_base_url.starts_with("https://"));
    }
}
