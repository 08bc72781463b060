//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait that data sources implement, and
//! the error taxonomy the retry layer keys off: transient errors are worth
//! retrying, shape errors are not.

use async_trait::async_trait;
use thiserror::Error;

use super::{ConstituentQuote, DailyBar, FlowBar, FlowQuote, SectorQuote, SpotQuote};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors produced by market data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection failed, timed out, or the endpoint answered with an HTTP error
    #[error("network error: {0}")]
    Network(String),
    /// Provider reachable but temporarily refusing service
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// Response arrived but its payload could not be interpreted
    #[error("unexpected response shape: {0}")]
    DataShape(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for A-share market data sources.
///
/// An operation that finds nothing returns `Ok` with an empty collection;
/// `Err` is reserved for transport and payload problems. Callers decide
/// what an empty result means for them.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for log output.
    fn name(&self) -> &'static str;

    /// Full-market spot snapshot: price, percent change, market caps.
    async fn spot_snapshot(&self) -> Result<Vec<SpotQuote>, ProviderError>;

    /// Market-wide main capital flow ranking.
    async fn flow_ranking(&self) -> Result<Vec<FlowQuote>, ProviderError>;

    /// Concept-board table in provider order.
    async fn sector_board(&self) -> Result<Vec<SectorQuote>, ProviderError>;

    /// Constituent stocks of one concept board.
    async fn board_constituents(
        &self,
        board_code: &str,
    ) -> Result<Vec<ConstituentQuote>, ProviderError>;

    /// Recent daily bars for a symbol, oldest first, front-adjusted.
    async fn daily_bars(&self, symbol: &str, limit: usize)
        -> Result<Vec<DailyBar>, ProviderError>;

    /// Daily main-flow history for a symbol, oldest first.
    async fn flow_history(&self, symbol: &str) -> Result<Vec<FlowBar>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
