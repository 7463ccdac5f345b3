//! TTL cache for provider roster data
//!
//! The clock is injected so expiry can be tested deterministically instead
//! of sleeping through real time.

use crate::error::Result;
use crate::provider::{ProviderRoster, RosterProvider};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock advanced by hand
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: std::sync::Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

struct CacheEntry {
    fetched_at: DateTime<Utc>,
    rosters: Vec<ProviderRoster>,
}

/// Caches provider rosters per external league id for one TTL window
pub struct RosterCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RosterCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock, entries: RwLock::new(HashMap::new()) }
    }

    /// Return cached rosters when fresh, otherwise fetch and cache
    pub async fn get_or_fetch(
        &self,
        provider: &dyn RosterProvider,
        external_league_id: &str,
    ) -> Result<Vec<ProviderRoster>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(external_league_id) {
                if now - entry.fetched_at < self.ttl {
                    return Ok(entry.rosters.clone());
                }
            }
        }

        let rosters = provider.league_rosters(external_league_id).await?;
        let mut entries = self.entries.write().await;
        entries.insert(
            external_league_id.to_string(),
            CacheEntry { fetched_at: now, rosters: rosters.clone() },
        );
        Ok(rosters)
    }

    /// Drop all cached entries
    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
    }
}
