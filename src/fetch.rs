use crate::cache::{CacheStore, CacheType};
use crate::config::{ApiSettings, HtmlSourceSettings, LoadedPlayer, SourceMode, resolve_path};
use crate::quota::QuotaMonitor;
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Denial from the quota monitor. Surfaced as "try again later": callers
/// must not retry it inside the current run.
#[derive(Debug)]
pub struct QuotaExceeded(pub String);

impl std::fmt::Display for QuotaExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request blocked by quota: {}", self.0)
    }
}

impl std::error::Error for QuotaExceeded {}

/// Minimum-delay gate in front of the stats site. The last-request instant
/// sits behind a mutex and the wait happens while holding it, so requests
/// against the host are strictly sequential even with concurrent workers.
#[derive(Debug)]
pub struct Throttle {
    min_delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last: Mutex::new(None),
        }
    }

    pub fn wait(&self) {
        let mut last = self.last.lock().expect("throttle mutex poisoned");
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                std::thread::sleep(self.min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

/// Retry schedule applied by the scheduling caller, never inside the fetch
/// functions themselves.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    // Quota denials are final for this run.
                    if err.downcast_ref::<QuotaExceeded>().is_some() || attempt == attempts {
                        return Err(err);
                    }
                    warn!(what, attempt, error = %err, "attempt failed; retrying");
                    std::thread::sleep(Duration::from_millis(self.backoff_ms));
                }
            }
        }

        bail!("{what} failed after retries")
    }
}

/// Deterministic cache key for a request URL.
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Cache-first, quota-gated fetch wrapper around every upstream call.
///
/// A cache hit bypasses the quota entirely. On a miss a slot is reserved
/// atomically via [`QuotaMonitor::reserve`]; a denial becomes a
/// [`QuotaExceeded`] error and the call is never made. Every reservation is
/// committed with the outcome, including transport failures (status 0).
/// Successful non-empty payloads are cached; empty responses are returned
/// uncached so later calls keep retrying upstream. Transport errors are
/// propagated for the scheduler's own retry policy.
pub fn fetch_cached(
    cache: &CacheStore,
    quota: &QuotaMonitor,
    cache_type: CacheType,
    endpoint: &str,
    url: &str,
    ttl: Option<Duration>,
    fetch: impl FnOnce() -> Result<(u16, Option<String>)>,
) -> Result<Option<String>> {
    let key = cache_key(url);
    if let Some(hit) = cache.get(cache_type, &key) {
        debug!(endpoint, url, "served from cache");
        return Ok(Some(hit));
    }

    let decision = quota.reserve();
    if !decision.allowed {
        return Err(QuotaExceeded(decision.reason).into());
    }

    match fetch() {
        Ok((status, Some(payload))) if !payload.is_empty() => {
            quota.commit(endpoint, status);
            cache.set(cache_type, &key, payload.clone(), ttl);
            Ok(Some(payload))
        }
        Ok((status, _)) => {
            quota.commit(endpoint, status);
            Ok(None)
        }
        Err(err) => {
            quota.commit(endpoint, 0);
            Err(err).with_context(|| format!("fetch of {url} failed"))
        }
    }
}

/// Client for the HTML stats site: per-player pages and per-season match
/// log pages, each addressed by the site's opaque player id.
pub struct HtmlSource {
    client: Client,
    base_url: String,
    throttle: Throttle,
}

impl HtmlSource {
    pub fn from_settings(settings: &HtmlSourceSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&settings.user_agent)?);

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build stats site client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            throttle: Throttle::new(Duration::from_millis(settings.min_delay_ms)),
        })
    }

    pub fn player_page_url(&self, site_id: &str) -> String {
        format!("{}/players/{site_id}/", self.base_url)
    }

    pub fn match_log_url(&self, site_id: &str, season: &str) -> String {
        format!("{}/players/{site_id}/matchlogs/{season}/", self.base_url)
    }

    pub fn fetch_player_page(
        &self,
        player: &LoadedPlayer,
        cache: &CacheStore,
        quota: &QuotaMonitor,
        ttl: Option<Duration>,
    ) -> Result<Option<String>> {
        match player.config.source.mode {
            SourceMode::Http => {
                let site_id = player
                    .config
                    .source
                    .site_id
                    .as_ref()
                    .context("source.site_id missing for http mode")?;
                let url = self.player_page_url(site_id);
                fetch_cached(
                    cache,
                    quota,
                    CacheType::PlayerDetail,
                    "site.player_page",
                    &url,
                    ttl,
                    || self.http_get(&url),
                )
            }
            SourceMode::File => {
                let file = player
                    .config
                    .source
                    .player_page_file
                    .as_ref()
                    .context("source.player_page_file missing for file mode")?;
                let resolved = resolve_path(&player.path, file)?;
                fetch_file(cache, quota, CacheType::PlayerDetail, "site.player_page", &resolved, ttl)
            }
        }
    }

    pub fn fetch_match_log(
        &self,
        player: &LoadedPlayer,
        season: &str,
        cache: &CacheStore,
        quota: &QuotaMonitor,
        ttl: Option<Duration>,
    ) -> Result<Option<String>> {
        match player.config.source.mode {
            SourceMode::Http => {
                let site_id = player
                    .config
                    .source
                    .site_id
                    .as_ref()
                    .context("source.site_id missing for http mode")?;
                let url = self.match_log_url(site_id, season);
                fetch_cached(
                    cache,
                    quota,
                    CacheType::MatchDetail,
                    "site.match_log",
                    &url,
                    ttl,
                    || self.http_get(&url),
                )
            }
            SourceMode::File => {
                let Some(file) = player.config.source.match_log_files.get(season) else {
                    debug!(player = %player.config.player.key, season, "no match log fixture for season");
                    return Ok(None);
                };
                let resolved = resolve_path(&player.path, file)?;
                fetch_cached(
                    cache,
                    quota,
                    CacheType::MatchDetail,
                    "site.match_log",
                    &format!("file://{}", resolved.display()),
                    ttl,
                    || read_fixture(&resolved),
                )
            }
        }
    }

    fn http_get(&self, url: &str) -> Result<(u16, Option<String>)> {
        self.throttle.wait();

        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "request returned non-success status");
            return Ok((status.as_u16(), None));
        }

        let body = response.text()?;
        Ok((status.as_u16(), Some(body)))
    }
}

fn fetch_file(
    cache: &CacheStore,
    quota: &QuotaMonitor,
    cache_type: CacheType,
    endpoint: &str,
    path: &Path,
    ttl: Option<Duration>,
) -> Result<Option<String>> {
    fetch_cached(
        cache,
        quota,
        cache_type,
        endpoint,
        &format!("file://{}", path.display()),
        ttl,
        || read_fixture(path),
    )
}

fn read_fixture(path: &Path) -> Result<(u16, Option<String>)> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    Ok((200, Some(body)))
}

/// Key-authenticated JSON API client. Responses arrive in two shapes, a
/// flat one with fields at top level and a nested `player`/`statistics[]`
/// wrapper, and both are tolerated without a schema flag.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = settings.resolve_key() {
            headers.insert("x-apisports-key", HeaderValue::from_str(&key)?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build api client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn search_players(
        &self,
        cache: &CacheStore,
        quota: &QuotaMonitor,
        name: &str,
    ) -> Result<Vec<ApiPlayerEntry>> {
        let url = self.endpoint_url("players", &[("search", name)])?;
        let Some(body) = fetch_cached(
            cache,
            quota,
            CacheType::PlayerList,
            "api.players.search",
            &url,
            None,
            || self.http_get(&url),
        )?
        else {
            return Ok(Vec::new());
        };

        let payload: Value = serde_json::from_str(&body)
            .with_context(|| format!("failed to parse json from {url}"))?;
        Ok(parse_player_entries(&payload))
    }

    pub fn team_roster(
        &self,
        cache: &CacheStore,
        quota: &QuotaMonitor,
        team_id: i64,
    ) -> Result<Vec<ApiPlayerEntry>> {
        let url = self.endpoint_url("players", &[("team", &team_id.to_string())])?;
        let Some(body) = fetch_cached(
            cache,
            quota,
            CacheType::TeamRosterList,
            "api.players.team",
            &url,
            None,
            || self.http_get(&url),
        )?
        else {
            return Ok(Vec::new());
        };

        let payload: Value = serde_json::from_str(&body)
            .with_context(|| format!("failed to parse json from {url}"))?;
        Ok(parse_player_entries(&payload))
    }

    pub fn fixtures(
        &self,
        cache: &CacheStore,
        quota: &QuotaMonitor,
        team_id: i64,
        live: bool,
    ) -> Result<Vec<ApiFixture>> {
        let url = self.endpoint_url("fixtures", &[("team", &team_id.to_string())])?;
        let cache_type = if live {
            CacheType::LiveMatchDetail
        } else {
            CacheType::MatchDetail
        };
        let Some(body) = fetch_cached(
            cache,
            quota,
            cache_type,
            "api.fixtures",
            &url,
            None,
            || self.http_get(&url),
        )?
        else {
            return Ok(Vec::new());
        };

        let payload: Value = serde_json::from_str(&body)
            .with_context(|| format!("failed to parse json from {url}"))?;
        Ok(parse_fixtures(&payload))
    }

    fn endpoint_url(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))
            .with_context(|| format!("invalid api base url {}", self.base_url))?;
        {
            let mut qp = url.query_pairs_mut();
            for (k, v) in params {
                qp.append_pair(k, v);
            }
        }
        Ok(url.to_string())
    }

    fn http_get(&self, url: &str) -> Result<(u16, Option<String>)> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "api request returned non-success status");
            return Ok((status.as_u16(), None));
        }

        let body = response.text()?;
        Ok((status.as_u16(), Some(body)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiPlayerEntry {
    pub id: Option<i64>,
    pub name: String,
    pub team: Option<String>,
    pub games: Option<u32>,
    pub minutes: Option<u32>,
    pub goals: Option<u32>,
    pub assists: Option<u32>,
}

pub fn parse_player_entries(payload: &Value) -> Vec<ApiPlayerEntry> {
    let mut entries = Vec::new();

    for item in response_items(payload, "players") {
        let entry = if let Some(player) = item.get("player").filter(|v| v.is_object()) {
            // Nested shape: identity under "player", per-competition numbers
            // under "statistics".
            let stats = item
                .get("statistics")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first());
            ApiPlayerEntry {
                id: player.get("id").and_then(Value::as_i64),
                name: string_field(player, "name").unwrap_or_default(),
                team: stats
                    .and_then(|s| s.get("team"))
                    .and_then(|t| string_field(t, "name")),
                games: stats
                    .and_then(|s| s.get("games"))
                    .and_then(|g| num_u32(g, &["appearences", "appearances"])),
                minutes: stats
                    .and_then(|s| s.get("games"))
                    .and_then(|g| num_u32(g, &["minutes"])),
                goals: stats
                    .and_then(|s| s.get("goals"))
                    .and_then(|g| num_u32(g, &["total"])),
                assists: stats
                    .and_then(|s| s.get("goals"))
                    .and_then(|g| num_u32(g, &["assists"])),
            }
        } else {
            ApiPlayerEntry {
                id: item.get("id").and_then(Value::as_i64),
                name: string_field(item, "name").unwrap_or_default(),
                team: string_field(item, "team"),
                games: num_u32(item, &["games", "appearances"]),
                minutes: num_u32(item, &["minutes"]),
                goals: num_u32(item, &["goals"]),
                assists: num_u32(item, &["assists"]),
            }
        };

        if entry.name.is_empty() {
            debug!("skipping api player entry with no name");
            continue;
        }
        entries.push(entry);
    }

    entries
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiFixture {
    pub id: Option<i64>,
    pub date: Option<String>,
    pub home: String,
    pub away: String,
    pub status: Option<String>,
}

pub fn parse_fixtures(payload: &Value) -> Vec<ApiFixture> {
    let mut fixtures = Vec::new();

    for item in response_items(payload, "fixtures") {
        let fixture = if let Some(meta) = item.get("fixture").filter(|v| v.is_object()) {
            let teams = item.get("teams");
            ApiFixture {
                id: meta.get("id").and_then(Value::as_i64),
                date: string_field(meta, "date"),
                home: teams
                    .and_then(|t| t.get("home"))
                    .and_then(|h| string_field(h, "name"))
                    .unwrap_or_default(),
                away: teams
                    .and_then(|t| t.get("away"))
                    .and_then(|a| string_field(a, "name"))
                    .unwrap_or_default(),
                status: meta
                    .get("status")
                    .and_then(|s| string_field(s, "short").or_else(|| string_field(s, "long"))),
            }
        } else {
            ApiFixture {
                id: item.get("id").and_then(Value::as_i64),
                date: string_field(item, "date"),
                home: string_field(item, "home").unwrap_or_default(),
                away: string_field(item, "away").unwrap_or_default(),
                status: string_field(item, "status"),
            }
        };

        if fixture.home.is_empty() && fixture.away.is_empty() {
            continue;
        }
        fixtures.push(fixture);
    }

    fixtures
}

fn response_items<'a>(payload: &'a Value, flat_key: &str) -> Vec<&'a Value> {
    if let Some(items) = payload.get("response").and_then(Value::as_array) {
        return items.iter().collect();
    }
    if let Some(items) = payload.get(flat_key).and_then(Value::as_array) {
        return items.iter().collect();
    }
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![payload],
        _ => Vec::new(),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Reads the first of `keys` as a number, tolerating both bare numbers and
/// `{"total": n}` wrappers.
fn num_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    for key in keys {
        let Some(found) = value.get(key) else {
            continue;
        };
        if let Some(n) = found.as_u64() {
            return u32::try_from(n).ok();
        }
        if let Some(n) = found.get("total").and_then(Value::as_u64) {
            return u32::try_from(n).ok();
        }
    }
    None
}
