//! Eastmoney adapter for A-share market data.
//!
//! Implements the MarketDataProvider trait over the public eastmoney
//! endpoints, the same upstream the akshare spot/board/kline helpers wrap
//! (免费、无限制).
//!
//! # Data Sources
//! - Spot snapshot, concept boards, constituents: push2.eastmoney.com clist
//! - Daily K-line: push2his.eastmoney.com kline
//! - Per-symbol capital flow: push2his.eastmoney.com fflow

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{MarketDataProvider, ProviderError};
use super::{ConstituentQuote, DailyBar, FlowBar, FlowQuote, SectorQuote, SpotQuote};

// ============================================================================
// Constants
// ============================================================================

/// Eastmoney list API (spot tables, boards, constituents)
const EASTMONEY_CLIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

/// Eastmoney historical K-line API
const EASTMONEY_KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";

/// Eastmoney per-symbol daily fund flow API
const EASTMONEY_FFLOW_URL: &str =
    "https://push2his.eastmoney.com/api/qt/stock/fflow/daykline/get";

/// Full A-share universe: SZ main + ChiNext, SH main + STAR, BSE
const SPOT_FS: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048";

/// Same universe restricted to rows carrying fund-flow figures
const FLOW_RANK_FS: &str =
    "m:0+t:6+f:!2,m:0+t:13+f:!2,m:0+t:80+f:!2,m:1+t:2+f:!2,m:1+t:23+f:!2,m:0+t:7+f:!2,m:1+t:3+f:!2";

/// Concept boards
const CONCEPT_FS: &str = "m:90+t:3+f:!50";

// ============================================================================
// Symbol Mapping
// ============================================================================

/// Convert a bare exchange code to the eastmoney secid.
///
/// "600000" -> "1.600000" (SH), "000001" -> "0.000001" (SZ/BJ)
fn to_secid(symbol: &str) -> String {
    if symbol.starts_with('6') || symbol.starts_with('9') {
        format!("1.{}", symbol)
    } else {
        format!("0.{}", symbol)
    }
}

// ============================================================================
// Row Field Helpers
// ============================================================================

/// Numeric field from a clist row. Suspended stocks arrive as the string
/// "-", which parses to `None` rather than an error.
fn num_field(row: &serde_json::Value, key: &str) -> Option<f64> {
    match row.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn str_field(row: &serde_json::Value, key: &str) -> Option<String> {
    row.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

// ============================================================================
// Eastmoney Provider
// ============================================================================

/// Market data adapter over the eastmoney push2 endpoints.
pub struct EastmoneyProvider {
    /// HTTP client
    client: reqwest::Client,
}

impl EastmoneyProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", response.status())));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::DataShape(format!("failed to parse response: {}", e)))
    }

    /// Fetch one clist page covering the whole universe for `fs`.
    async fn fetch_clist(
        &self,
        fs: &str,
        fid: &str,
        fields: &str,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        let url = format!(
            "{}?pn=1&pz=50000&po=1&np=1&fltt=2&invt=2&fid={}&fs={}&fields={}",
            EASTMONEY_CLIST_URL, fid, fs, fields
        );

        debug!(url = %url, "Fetching clist from eastmoney");

        let data: ClistResponse = self.get_json(&url).await?;
        if data.rc != 0 {
            return Err(ProviderError::Unavailable(format!("eastmoney rc={}", data.rc)));
        }

        Ok(data.data.and_then(|d| d.diff).unwrap_or_default())
    }

    /// Fetch comma-joined kline strings from a push2his endpoint.
    async fn fetch_kline_strings(&self, url: &str) -> Result<Vec<String>, ProviderError> {
        let data: KlineResponse = self.get_json(url).await?;
        if data.rc != 0 {
            return Err(ProviderError::Unavailable(format!("eastmoney rc={}", data.rc)));
        }

        Ok(data.data.and_then(|d| d.klines).unwrap_or_default())
    }
}

impl Default for EastmoneyProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for EastmoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn spot_snapshot(&self) -> Result<Vec<SpotQuote>, ProviderError> {
        let rows = self
            .fetch_clist(SPOT_FS, "f3", "f2,f3,f12,f14,f20,f21")
            .await?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            let (Some(symbol), Some(name)) = (str_field(row, "f12"), str_field(row, "f14"))
            else {
                warn!(row = %row, "Spot row missing code or name, skipping");
                continue;
            };
            quotes.push(SpotQuote {
                symbol,
                name,
                latest: num_field(row, "f2"),
                pct_change: num_field(row, "f3"),
                total_cap: num_field(row, "f20"),
                float_cap: num_field(row, "f21"),
            });
        }

        Ok(quotes)
    }

    async fn flow_ranking(&self) -> Result<Vec<FlowQuote>, ProviderError> {
        let rows = self.fetch_clist(FLOW_RANK_FS, "f62", "f12,f14,f62").await?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            let (Some(symbol), Some(name)) = (str_field(row, "f12"), str_field(row, "f14"))
            else {
                warn!(row = %row, "Flow row missing code or name, skipping");
                continue;
            };
            quotes.push(FlowQuote {
                symbol,
                name,
                main_net_inflow: num_field(row, "f62"),
            });
        }

        Ok(quotes)
    }

    async fn sector_board(&self) -> Result<Vec<SectorQuote>, ProviderError> {
        let rows = self.fetch_clist(CONCEPT_FS, "f3", "f2,f3,f12,f14").await?;

        let mut boards = Vec::with_capacity(rows.len());
        for row in &rows {
            let (Some(code), Some(name)) = (str_field(row, "f12"), str_field(row, "f14"))
            else {
                warn!(row = %row, "Board row missing code or name, skipping");
                continue;
            };
            boards.push(SectorQuote {
                code,
                name,
                pct_change: num_field(row, "f3"),
            });
        }

        Ok(boards)
    }

    async fn board_constituents(
        &self,
        board_code: &str,
    ) -> Result<Vec<ConstituentQuote>, ProviderError> {
        let fs = format!("b:{}+f:!50", board_code);
        let rows = self.fetch_clist(&fs, "f3", "f2,f3,f12,f14,f20").await?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            let (Some(symbol), Some(name)) = (str_field(row, "f12"), str_field(row, "f14"))
            else {
                warn!(row = %row, "Constituent row missing code or name, skipping");
                continue;
            };
            quotes.push(ConstituentQuote {
                symbol,
                name,
                pct_change: num_field(row, "f3"),
                total_cap: num_field(row, "f20"),
            });
        }

        Ok(quotes)
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        // klt=101 daily, fqt=1 front-adjusted
        let url = format!(
            "{}?secid={}&klt=101&fqt=1&lmt={}&fields1=f1,f2,f3,f4,f5,f6&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61",
            EASTMONEY_KLINE_URL,
            to_secid(symbol),
            limit
        );

        debug!(url = %url, symbol = symbol, "Fetching kline from eastmoney");

        let klines = self.fetch_kline_strings(&url).await?;
        Ok(parse_daily_klines(&klines))
    }

    async fn flow_history(&self, symbol: &str) -> Result<Vec<FlowBar>, ProviderError> {
        let url = format!(
            "{}?secid={}&lmt=0&klt=101&fields1=f1,f2,f3,f7&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61,f62,f63,f64,f65",
            EASTMONEY_FFLOW_URL,
            to_secid(symbol)
        );

        debug!(url = %url, symbol = symbol, "Fetching fund flow from eastmoney");

        let klines = self.fetch_kline_strings(&url).await?;
        Ok(parse_flow_klines(&klines))
    }
}

// ============================================================================
// Kline Parsing
// ============================================================================

/// Parse eastmoney kline strings into daily bars, oldest first.
///
/// Format: "2025-06-02,10.50,10.80,10.90,10.40,1000000,10500000,4.8,2.86,0.30,1.2"
/// Fields: date,open,close,high,low,volume,amount,amplitude,pct_change,...
/// Malformed lines are skipped.
fn parse_daily_klines(klines: &[String]) -> Vec<DailyBar> {
    let mut bars = Vec::with_capacity(klines.len());

    for line in klines {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 9 {
            warn!(line = line.as_str(), "Invalid kline format, skipping");
            continue;
        }

        let Ok(date) = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d") else {
            warn!(line = line.as_str(), "Invalid kline date, skipping");
            continue;
        };
        let Some(nums) = parts[1..9]
            .iter()
            .map(|p| p.parse::<f64>().ok())
            .collect::<Option<Vec<f64>>>()
        else {
            warn!(line = line.as_str(), "Invalid kline number, skipping");
            continue;
        };

        bars.push(DailyBar {
            date,
            open: nums[0],
            close: nums[1],
            high: nums[2],
            low: nums[3],
            volume: nums[4],
            amount: nums[5],
            pct_change: nums[7],
        });
    }

    bars.sort_by_key(|b| b.date);
    bars
}

/// Parse eastmoney fflow strings into flow bars, oldest first.
///
/// Format: "2025-06-02,1234567.0,..." with the main net inflow second.
fn parse_flow_klines(klines: &[String]) -> Vec<FlowBar> {
    let mut bars = Vec::with_capacity(klines.len());

    for line in klines {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 2 {
            warn!(line = line.as_str(), "Invalid flow line, skipping");
            continue;
        }

        let (Ok(date), Ok(main_net_inflow)) = (
            NaiveDate::parse_from_str(parts[0], "%Y-%m-%d"),
            parts[1].parse::<f64>(),
        ) else {
            warn!(line = line.as_str(), "Invalid flow line, skipping");
            continue;
        };

        bars.push(FlowBar {
            date,
            main_net_inflow,
        });
    }

    bars.sort_by_key(|b| b.date);
    bars
}

// ============================================================================
// Eastmoney API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClistResponse {
    /// Return code (0 = success)
    rc: i32,
    /// Data
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    /// Row count
    #[allow(dead_code)]
    total: Option<i64>,
    /// Table rows
    diff: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    /// Return code (0 = success)
    rc: i32,
    /// Data
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    /// Stock code
    #[allow(dead_code)]
    code: Option<String>,
    /// K-line data as strings
    klines: Option<Vec<String>>,
}

// ============================================================================
// Tests
// ============================================================================
