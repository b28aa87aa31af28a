use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    Lineup,
    MatchDetail,
    LiveMatchDetail,
    PlayerDetail,
    PlayerList,
    TeamRosterList,
}

impl CacheType {
    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheType::Lineup => Duration::from_secs(6 * 3600),
            CacheType::MatchDetail => Duration::from_secs(3600),
            CacheType::LiveMatchDetail => Duration::from_secs(300),
            CacheType::PlayerDetail => Duration::from_secs(12 * 3600),
            CacheType::PlayerList => Duration::from_secs(3600),
            CacheType::TeamRosterList => Duration::from_secs(24 * 3600),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Lineup => "lineup",
            CacheType::MatchDetail => "match_detail",
            CacheType::LiveMatchDetail => "live_match_detail",
            CacheType::PlayerDetail => "player_detail",
            CacheType::PlayerList => "player_list",
            CacheType::TeamRosterList => "team_roster_list",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub cache_type: CacheType,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
}

/// TTL key/value cache shielding the quota-limited upstreams. Expiry is
/// lazy: `get` refuses stale rows even while they still physically exist,
/// and `cleanup_expired` sweeps them eagerly. Shared across sync workers
/// behind a mutex.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cache file {}", path.display()))?;
        let entries: BTreeMap<String, CacheEntry> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse cache file {}", path.display()))?;
        Ok(Self {
            entries: Mutex::new(entries),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create cache directory {}", parent.display())
            })?;
        }

        let entries = self.entries.lock().expect("cache mutex poisoned");
        let serialized = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("failed to write cache file {}", path.display()))?;
        Ok(())
    }

    /// Returns the payload for `key`, or a miss when the key is absent or
    /// its expiry has passed. Hits bump the entry's hit count.
    pub fn get(&self, cache_type: CacheType, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let entry = entries.get_mut(key)?;

        if Utc::now() >= entry.expires_at {
            debug!(cache_type = cache_type.as_str(), key, "cache entry expired");
            return None;
        }

        entry.hit_count += 1;
        Some(entry.payload.clone())
    }

    /// Upsert keyed by `key` alone; the cache type is metadata. Refreshes
    /// payload and expiry on every call and resets hit accounting.
    pub fn set(&self, cache_type: CacheType, key: &str, payload: String, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| cache_type.default_ttl());
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));

        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                cache_key: key.to_string(),
                cache_type,
                payload,
                created_at: now,
                expires_at,
                hit_count: 0,
            },
        );
    }

    /// Cache-first read calling `fetch` at most once on a miss. A fetch that
    /// produced no data is returned but never cached, so later calls keep
    /// retrying upstream.
    pub fn get_or_fetch<F>(
        &self,
        cache_type: CacheType,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<Option<String>>
    where
        F: FnOnce() -> Result<Option<String>>,
    {
        if let Some(hit) = self.get(cache_type, key) {
            return Ok(Some(hit));
        }

        let fetched = fetch()?;
        if let Some(payload) = &fetched
            && !payload.is_empty()
        {
            self.set(cache_type, key, payload.clone(), ttl);
        }

        Ok(fetched)
    }

    /// Removes one entry, or every entry of `cache_type` when `key` is
    /// `None`. Returns the number of rows removed.
    pub fn invalidate(&self, cache_type: CacheType, key: Option<&str>) -> usize {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match key {
            Some(key) => usize::from(entries.remove(key).is_some()),
            None => {
                let before = entries.len();
                entries.retain(|_, e| e.cache_type != cache_type);
                before - entries.len()
            }
        }
    }

    /// Eager sweep of rows whose expiry has passed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
