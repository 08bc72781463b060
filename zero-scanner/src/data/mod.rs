//! Market data layer.
//!
//! Core row/bar types shared across the scanner, the provider trait, the
//! eastmoney adapter, and the bounded-retry fetch wrapper.

pub mod eastmoney;
pub mod fetch;
pub mod provider;

pub use eastmoney::EastmoneyProvider;
pub use fetch::{FetchOutcome, FetchPolicy, ResilientFetcher};
pub use provider::{MarketDataProvider, ProviderError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Per-Symbol Series
// ============================================================================

/// One daily candle for a single symbol (front-adjusted prices).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Traded volume in lots
    pub volume: f64,
    /// Turnover in yuan
    pub amount: f64,
    /// Same-day percent change
    pub pct_change: f64,
}

impl DailyBar {
    /// A session that closed at or above its open with a positive gain.
    pub fn is_up_session(&self) -> bool {
        self.close >= self.open && self.pct_change > 0.0
    }
}

/// One daily main-capital observation for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBar {
    pub date: NaiveDate,
    /// Net inflow of large and super-large orders, in yuan
    pub main_net_inflow: f64,
}

// ============================================================================
// Market Tables
// ============================================================================

/// Row from the full-market spot snapshot.
///
/// Numeric fields are `None` for suspended stocks, where the upstream
/// table carries "-" instead of a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotQuote {
    pub symbol: String,
    pub name: String,
    pub latest: Option<f64>,
    pub pct_change: Option<f64>,
    /// Total market cap in yuan
    pub total_cap: Option<f64>,
    /// Float market cap in yuan
    pub float_cap: Option<f64>,
}

/// Row from the market-wide main capital flow ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowQuote {
    pub symbol: String,
    pub name: String,
    /// Same-day main net inflow in yuan
    pub main_net_inflow: Option<f64>,
}

/// Concept-board row from the sector table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorQuote {
    /// Board code, e.g. "BK0493"
    pub code: String,
    pub name: String,
    pub pct_change: Option<f64>,
}

/// Constituent row of a concept board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstituentQuote {
    pub symbol: String,
    pub name: String,
    pub pct_change: Option<f64>,
    /// Total market cap in yuan
    pub total_cap: Option<f64>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, close: f64, pct_change: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            open,
            close,
            high: open.max(close),
            low: open.min(close),
            volume: 100_000.0,
            amount: 1_000_000.0,
            pct_change,
        }
    }

    #[test]
    fn up_session_requires_close_at_or_above_open_and_positive_pct() {
        assert!(bar(10.0, 10.5, 2.0).is_up_session());
        // Doji that still gained against the prior close
        assert!(bar(10.0, 10.0, 0.5).is_up_session());
        // Closed below open
        assert!(!bar(10.5, 10.0, 2.0).is_up_session());
        // Gapped down, recovered intraday, still negative on the day
        assert!(!bar(9.5, 9.8, -1.0).is_up_session());
        // Flat day
        assert!(!bar(10.0, 10.0, 0.0).is_up_session());
    }
}
