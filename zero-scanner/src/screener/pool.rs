//! Candidate pool builders.
//!
//! Two ways to pick the stocks worth the per-symbol deep screen:
//!
//! - Market-wide: join the spot table with the fund-flow ranking and keep
//!   small-cap stocks where main capital is quietly building a position
//!   (meaningful inflow against float, modest day gain).
//! - Sector-derived: walk the top concept boards, new boards first, and
//!   pool their gaining constituents.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::data::{
    ConstituentQuote, FlowQuote, MarketDataProvider, ResilientFetcher, SpotQuote,
};
use crate::screener::config::PoolConfig;
use crate::sector::{RankedSector, SectorScan};

// ============================================================================
// Pool Strategy
// ============================================================================

/// Which pool the funnel screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStrategy {
    /// Spot table joined with the fund-flow ranking
    MarketWide,
    /// Constituents of the top concept boards
    SectorDerived,
}

impl std::fmt::Display for PoolStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolStrategy::MarketWide => write!(f, "market"),
            PoolStrategy::SectorDerived => write!(f, "sector"),
        }
    }
}

impl std::str::FromStr for PoolStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" | "market_wide" => Ok(PoolStrategy::MarketWide),
            "sector" | "sector_derived" => Ok(PoolStrategy::SectorDerived),
            other => Err(format!("unknown pool strategy: {}", other)),
        }
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// One stock entering the screening funnel.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    /// Exchange code
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Day change percent at pool time
    pub pct_change: f64,
    /// Total market cap in yuan
    pub total_cap: Option<f64>,
    /// Main inflow as percent of float cap (market-wide pool only)
    pub flow_intensity: Option<f64>,
    /// Concept board that sourced this candidate (sector pool only)
    pub sector: Option<String>,
}

// ============================================================================
// Pool Builder
// ============================================================================

/// Builds the candidate pool for one scan.
pub struct PoolBuilder<P: MarketDataProvider> {
    provider: Arc<P>,
    fetcher: ResilientFetcher,
    config: PoolConfig,
}

impl<P: MarketDataProvider> PoolBuilder<P> {
    pub fn new(provider: Arc<P>, fetcher: ResilientFetcher, config: PoolConfig) -> Self {
        Self {
            provider,
            fetcher,
            config,
        }
    }

    /// Build the pool for `strategy`. A data outage yields an empty pool
    /// rather than an error so the scan can still produce its report.
    pub async fn build(&self, strategy: PoolStrategy, sectors: &SectorScan) -> Vec<Candidate> {
        match strategy {
            PoolStrategy::MarketWide => self.build_market_wide().await,
            PoolStrategy::SectorDerived => self.build_sector_derived(sectors).await,
        }
    }

    async fn build_market_wide(&self) -> Vec<Candidate> {
        let spot = self
            .fetcher
            .fetch("spot_snapshot", || {
                let provider = Arc::clone(&self.provider);
                async move { provider.spot_snapshot().await }
            })
            .await;
        let Some(spot) = spot.data() else {
            warn!("Spot snapshot unavailable, market pool empty");
            return Vec::new();
        };

        let flows = self
            .fetcher
            .fetch("flow_ranking", || {
                let provider = Arc::clone(&self.provider);
                async move { provider.flow_ranking().await }
            })
            .await;
        let Some(flows) = flows.data() else {
            warn!("Flow ranking unavailable, market pool empty");
            return Vec::new();
        };

        let pool = assemble_market_pool(spot, flows, &self.config);
        info!(candidates = pool.len(), "Market-wide candidate pool built");
        pool
    }

    async fn build_sector_derived(&self, sectors: &SectorScan) -> Vec<Candidate> {
        // New boards first so the cap trims yesterday's themes, not today's
        let ordered: Vec<&RankedSector> = sectors
            .top
            .iter()
            .filter(|s| s.is_new)
            .chain(sectors.top.iter().filter(|s| !s.is_new))
            .collect();

        let mut pool = Vec::new();
        let mut seen = HashSet::new();

        for sector in ordered {
            if pool.len() >= self.config.sector_pool_limit {
                break;
            }

            let outcome = self
                .fetcher
                .fetch("board_constituents", || {
                    let provider = Arc::clone(&self.provider);
                    let code = sector.code.clone();
                    async move { provider.board_constituents(&code).await }
                })
                .await;
            let Some(rows) = outcome.data() else {
                warn!(
                    board = sector.name.as_str(),
                    "Constituents unavailable, skipping board"
                );
                continue;
            };

            merge_constituents(&mut pool, &mut seen, &sector.name, rows, &self.config);
        }

        pool.truncate(self.config.sector_pool_limit);
        info!(candidates = pool.len(), "Sector-derived candidate pool built");
        pool
    }
}

// ============================================================================
// Pool Assembly
// ============================================================================

/// Join spot quotes with the flow ranking and apply the pool filters.
fn assemble_market_pool(
    spot: Vec<SpotQuote>,
    flows: Vec<FlowQuote>,
    config: &PoolConfig,
) -> Vec<Candidate> {
    let flow_by_symbol: HashMap<String, f64> = flows
        .into_iter()
        .filter_map(|f| f.main_net_inflow.map(|v| (f.symbol, v)))
        .collect();

    let mut pool = Vec::new();
    for quote in spot {
        // Stocks absent from the flow ranking carry no usable signal
        let Some(inflow) = flow_by_symbol.get(&quote.symbol) else {
            continue;
        };
        if is_excluded(&quote.name, &config.exclude_markers) {
            continue;
        }
        let Some(float_cap) = quote.float_cap.filter(|c| *c > 0.0) else {
            continue;
        };
        let intensity = inflow / float_cap * 100.0;
        if intensity <= config.min_flow_intensity {
            continue;
        }
        let Some(pct) = quote.pct_change else {
            continue;
        };
        if pct <= 0.0 || pct >= config.max_spot_pct {
            continue;
        }

        pool.push(Candidate {
            symbol: quote.symbol,
            name: quote.name,
            pct_change: pct,
            total_cap: quote.total_cap,
            flow_intensity: Some(intensity),
            sector: None,
        });
    }

    // Smallest caps first, unknown caps last
    pool.sort_by(|a, b| match (a.total_cap, b.total_cap) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    pool.truncate(config.market_pool_limit);
    pool
}

/// Fold one board's constituents into the pool. The first board to show
/// a symbol claims it.
fn merge_constituents(
    pool: &mut Vec<Candidate>,
    seen: &mut HashSet<String>,
    sector_name: &str,
    rows: Vec<ConstituentQuote>,
    config: &PoolConfig,
) {
    for row in rows {
        if !seen.insert(row.symbol.clone()) {
            continue;
        }
        if is_excluded(&row.name, &config.exclude_markers) {
            continue;
        }
        let Some(pct) = row.pct_change else {
            continue;
        };
        if pct <= 0.0 || pct >= config.max_spot_pct {
            continue;
        }

        pool.push(Candidate {
            symbol: row.symbol,
            name: row.name,
            pct_change: pct,
            total_cap: row.total_cap,
            flow_intensity: None,
            sector: Some(sector_name.to_string()),
        });
    }
}

fn is_excluded(name: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| name.contains(m))
}

// ============================================================================
// Tests
// ============================================================================
