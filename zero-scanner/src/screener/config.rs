//! Screener configuration.
//!
//! Thresholds for the candidate pool builder and the gate funnel, with
//! serde defaults so a partial config file or a few env overrides are
//! enough to run.

use serde::{Deserialize, Serialize};

// ============================================================================
// Pool Configuration
// ============================================================================

/// Candidate pool thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Stocks whose name contains any marker are excluded
    #[serde(default = "default_exclude_markers")]
    pub exclude_markers: Vec<String>,
    /// Minimum main inflow as percent of float cap (exclusive)
    #[serde(default = "default_min_flow_intensity")]
    pub min_flow_intensity: f64,
    /// Day gain ceiling for pool entry (exclusive)
    #[serde(default = "default_max_spot_pct")]
    pub max_spot_pct: f64,
    /// Market-wide pool size cap
    #[serde(default = "default_market_pool_limit")]
    pub market_pool_limit: usize,
    /// Sector-derived pool size cap
    #[serde(default = "default_sector_pool_limit")]
    pub sector_pool_limit: usize,
}

fn default_exclude_markers() -> Vec<String> {
    vec!["ST".to_string(), "退".to_string()]
}

fn default_min_flow_intensity() -> f64 {
    0.5
}

fn default_max_spot_pct() -> f64 {
    8.0
}

fn default_market_pool_limit() -> usize {
    60
}

fn default_sector_pool_limit() -> usize {
    100
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            exclude_markers: default_exclude_markers(),
            min_flow_intensity: default_min_flow_intensity(),
            max_spot_pct: default_max_spot_pct(),
            market_pool_limit: default_market_pool_limit(),
            sector_pool_limit: default_sector_pool_limit(),
        }
    }
}

// ============================================================================
// Funnel Configuration
// ============================================================================

/// Gate thresholds for the screening funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelConfig {
    /// Minimum daily bars required to evaluate a stock
    #[serde(default = "default_min_history_bars")]
    pub min_history_bars: usize,
    /// Cumulative 3-day rise floor in percent (exclusive)
    #[serde(default)]
    pub min_cum_rise_pct: f64,
    /// Cumulative 3-day rise ceiling in percent (exclusive)
    #[serde(default = "default_max_cum_rise_pct")]
    pub max_cum_rise_pct: f64,
    /// Volume ratio ceiling (inclusive)
    #[serde(default = "default_max_volume_ratio")]
    pub max_volume_ratio: f64,
    /// Daily bars to request per stock
    #[serde(default = "default_bar_fetch_limit")]
    pub bar_fetch_limit: usize,
    /// Lower bound of the jittered inter-request delay
    #[serde(default = "default_throttle_min_ms")]
    pub throttle_min_ms: u64,
    /// Upper bound of the jittered inter-request delay
    #[serde(default = "default_throttle_max_ms")]
    pub throttle_max_ms: u64,
}

fn default_min_history_bars() -> usize {
    5
}

fn default_max_cum_rise_pct() -> f64 {
    10.0
}

fn default_max_volume_ratio() -> f64 {
    2.5
}

fn default_bar_fetch_limit() -> usize {
    30
}

fn default_throttle_min_ms() -> u64 {
    150
}

fn default_throttle_max_ms() -> u64 {
    600
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            min_history_bars: default_min_history_bars(),
            min_cum_rise_pct: 0.0,
            max_cum_rise_pct: default_max_cum_rise_pct(),
            max_volume_ratio: default_max_volume_ratio(),
            bar_fetch_limit: default_bar_fetch_limit(),
            throttle_min_ms: default_throttle_min_ms(),
            throttle_max_ms: default_throttle_max_ms(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
