use crate::cache::CacheType;
use crate::model::PlayerRole;
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub html: HtmlSourceSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub quota: QuotaSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlSourceSettings {
    #[serde(default = "default_html_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum delay between requests against the stats site. Politeness
    /// measure; requests against this host are strictly sequential.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u8,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for HtmlSourceSettings {
    fn default() -> Self {
        Self {
            base_url: default_html_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            min_delay_ms: default_min_delay_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiSettings {
    pub fn resolve_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.key_env).ok())
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: None,
            key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Per-type TTL overrides in seconds, keyed by the cache type name.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheSettings {
    #[serde(default)]
    pub ttl_secs: BTreeMap<String, u64>,
}

impl CacheSettings {
    pub fn ttl_for(&self, cache_type: CacheType) -> Duration {
        self.ttl_secs
            .get(cache_type.as_str())
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_else(|| cache_type.default_ttl())
    }
}

/// Defaults are sized for a free-tier upstream plan; both caps are
/// overridable from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaSettings {
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u64,
    #[serde(default = "default_monthly_quota")]
    pub monthly_quota: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            daily_quota: default_daily_quota(),
            monthly_quota: default_monthly_quota(),
            retention_days: default_retention_days(),
        }
    }
}

impl QuotaSettings {
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("DAILY_REQUEST_QUOTA")
            && let Ok(quota) = value.parse::<u64>()
        {
            self.daily_quota = quota;
        }
        if let Ok(value) = std::env::var("MONTHLY_REQUEST_QUOTA")
            && let Ok(quota) = value.parse::<u64>()
        {
            self.monthly_quota = quota;
        }
    }
}

pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read app config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse toml in {}", path.display()))?
        }
        Some(path) => bail!("app config does not exist: {}", path.display()),
        None => AppConfig::default(),
    };

    config.quota.apply_env_overrides();
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct LoadedPlayer {
    pub path: PathBuf,
    pub config: PlayerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    pub player: PlayerMeta,
    #[serde(default)]
    pub source: PlayerSourceConfig,
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.player.key.trim().is_empty() {
            bail!("player.key must not be empty");
        }
        if self.player.name.trim().is_empty() {
            bail!("player.name must not be empty");
        }

        match self.source.mode {
            SourceMode::Http => {
                if self.source.site_id.is_none() {
                    bail!("source.site_id is required for http mode");
                }
            }
            SourceMode::File => {
                if self.source.player_page_file.is_none()
                    && self.source.match_log_files.is_empty()
                {
                    bail!("file mode needs a player_page_file or match_log_files");
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerMeta {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub role: PlayerRole,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    Http,
    File,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlayerSourceConfig {
    #[serde(default)]
    pub mode: SourceMode,
    /// Opaque id the stats site assigns to the player.
    #[serde(default)]
    pub site_id: Option<String>,
    /// Id on the JSON API side, when known.
    #[serde(default)]
    pub api_id: Option<i64>,
    #[serde(default)]
    pub player_page_file: Option<PathBuf>,
    /// Season label -> fixture file, for file mode match logs.
    #[serde(default)]
    pub match_log_files: BTreeMap<String, PathBuf>,
}

pub fn load_players_from_dir(players_dir: &Path) -> Result<Vec<LoadedPlayer>> {
    if !players_dir.exists() {
        bail!("players dir does not exist: {}", players_dir.display());
    }

    let mut loaded = Vec::new();
    for entry in WalkDir::new(players_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        loaded.push(load_player_file(path)?);
    }

    loaded.sort_by(|a, b| a.config.player.key.cmp(&b.config.player.key));
    Ok(loaded)
}

pub fn load_player_file(path: &Path) -> Result<LoadedPlayer> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read player config: {}", path.display()))?;
    let config: PlayerConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid player config {}", path.display()))?;
    Ok(LoadedPlayer {
        path: path.to_path_buf(),
        config,
    })
}

pub fn resolve_path(base_config_path: &Path, maybe_relative: &Path) -> Result<PathBuf> {
    if maybe_relative.is_absolute() {
        return Ok(maybe_relative.to_path_buf());
    }

    let parent = base_config_path.parent().ok_or_else(|| {
        anyhow!(
            "player config has no parent directory: {}",
            base_config_path.display()
        )
    })?;

    Ok(parent.join(maybe_relative))
}

fn default_true() -> bool {
    true
}

fn default_html_base_url() -> String {
    "https://fbref.com/en".to_string()
}

fn default_api_base_url() -> String {
    "https://v3.football.api-sports.io".to_string()
}

fn default_api_key_env() -> String {
    "STATS_API_KEY".to_string()
}

fn default_user_agent() -> String {
    "fbstats/0.1 (+https://example.invalid)".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_min_delay_ms() -> u64 {
    3000
}

fn default_retry_attempts() -> u8 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_daily_quota() -> u64 {
    100
}

fn default_monthly_quota() -> u64 {
    3000
}

fn default_retention_days() -> i64 {
    90
}
