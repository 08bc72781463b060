//! Scanner configuration.
//!
//! Defaults cover a full run out of the box; deployment tweaks come in
//! through environment variables, which matters when the scanner runs as
//! a scheduled CI job where env is the only knob. Unparsable overrides
//! are logged and ignored rather than aborting the scan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::data::FetchPolicy;
use crate::screener::{FunnelConfig, PoolConfig, PoolStrategy};
use crate::sector::SectorConfig;

// ============================================================================
// Output Configuration
// ============================================================================

/// Where scan artifacts land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Sector history JSON file
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Archive directory for dated report pages
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    /// Index page path
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,
    /// Public URL prefix of the archive, for digest links
    #[serde(default)]
    pub page_url_prefix: Option<String>,
}

fn default_history_file() -> PathBuf {
    PathBuf::from("data/sector_history.json")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("docs/archive")
}

fn default_index_file() -> PathBuf {
    PathBuf::from("docs/index.html")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            history_file: default_history_file(),
            archive_dir: default_archive_dir(),
            index_file: default_index_file(),
            page_url_prefix: None,
        }
    }
}

impl OutputConfig {
    /// Public URL of the archive page for `date`, when a prefix is set.
    pub fn page_url(&self, date: NaiveDate) -> Option<String> {
        self.page_url_prefix
            .as_ref()
            .map(|prefix| format!("{}/{}.html", prefix, date.format("%Y-%m-%d")))
    }
}

// ============================================================================
// Telegram Configuration
// ============================================================================

/// Telegram digest settings. Empty means disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

// ============================================================================
// Scan Configuration
// ============================================================================

/// Everything one scan needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Candidate pool strategy
    #[serde(default = "default_strategy")]
    pub strategy: PoolStrategy,
    /// Retry and backoff policy for upstream fetches
    #[serde(default)]
    pub fetch: FetchPolicy,
    /// Sector ranking settings
    #[serde(default)]
    pub sector: SectorConfig,
    /// Candidate pool thresholds
    #[serde(default)]
    pub pool: PoolConfig,
    /// Funnel gate thresholds
    #[serde(default)]
    pub funnel: FunnelConfig,
    /// Artifact paths
    #[serde(default)]
    pub output: OutputConfig,
    /// Telegram digest settings
    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_strategy() -> PoolStrategy {
    PoolStrategy::MarketWide
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            fetch: FetchPolicy::default(),
            sector: SectorConfig::default(),
            pool: PoolConfig::default(),
            funnel: FunnelConfig::default(),
            output: OutputConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Build a config from environment variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(token) = std::env::var("TG_BOT_TOKEN") {
            config.telegram.bot_token = token.trim().to_string();
        }
        if let Ok(raw) = std::env::var("TG_CHAT_IDS") {
            config.telegram.chat_ids = parse_chat_ids(&raw);
        }

        apply_path(&mut config.output.history_file, "HISTORY_FILE");
        apply_path(&mut config.output.archive_dir, "ARCHIVE_DIR");
        apply_path(&mut config.output.index_file, "INDEX_FILE");
        if let Ok(raw) = std::env::var("PAGE_URL_PREFIX") {
            let prefix = raw.trim().trim_end_matches('/');
            if !prefix.is_empty() {
                config.output.page_url_prefix = Some(prefix.to_string());
            }
        }

        apply_parsed(&mut config.strategy, "POOL_STRATEGY");
        apply_parsed(&mut config.sector.top_k, "SECTOR_TOP_K");
        apply_parsed(&mut config.pool.min_flow_intensity, "MIN_FLOW_INTENSITY");
        apply_parsed(&mut config.pool.market_pool_limit, "MARKET_POOL_LIMIT");
        apply_parsed(&mut config.pool.sector_pool_limit, "SECTOR_POOL_LIMIT");
        apply_parsed(&mut config.funnel.min_cum_rise_pct, "MIN_CUM_RISE_PCT");
        apply_parsed(&mut config.funnel.max_cum_rise_pct, "MAX_CUM_RISE_PCT");
        apply_parsed(&mut config.funnel.max_volume_ratio, "MAX_VOLUME_RATIO");
        apply_parsed(&mut config.funnel.throttle_min_ms, "THROTTLE_MIN_MS");
        apply_parsed(&mut config.funnel.throttle_max_ms, "THROTTLE_MAX_MS");

        config
    }
}

// ============================================================================
// Env Helpers
// ============================================================================

/// Comma-separated chat IDs, trimmed, blanks dropped.
fn parse_chat_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_path(slot: &mut PathBuf, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        let raw = raw.trim();
        if !raw.is_empty() {
            *slot = PathBuf::from(raw);
        }
    }
}

/// Parse an env override into `slot`, keeping the default on bad input.
fn apply_parsed<T: std::str::FromStr>(slot: &mut T, var: &str)
where
    T::Err: std::fmt::Display,
{
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }

    match raw.parse::<T>() {
        Ok(value) => *slot = value,
        Err(e) => {
            warn!(var = var, value = raw, error = %e, "Invalid override, keeping default")
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
