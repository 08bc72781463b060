//! Screening funnel.
//!
//! Each candidate passes an ordered chain of gates over its recent daily
//! bars and fund-flow history:
//!
//! 1. Enough history to judge at all
//! 2. Three straight up sessions (close at or above open, positive change)
//! 3. Cumulative 3-day rise inside the configured window
//! 4. Volume expanding but not exploding against the prior session
//! 5. Positive 3-day main capital inflow
//!
//! The first failed gate decides the rejection reason, so the per-reason
//! tally reads as a funnel: every candidate lands in exactly one bucket.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{DailyBar, FetchOutcome, FlowBar, MarketDataProvider, ResilientFetcher};
use crate::screener::config::FunnelConfig;
use crate::screener::pool::{Candidate, PoolStrategy};

/// Consecutive up sessions required by the trend gate.
const TREND_SESSIONS: usize = 3;

/// Trading days summed by the fund-flow gate.
const FLOW_SESSIONS: usize = 3;

// ============================================================================
// Reason Codes
// ============================================================================

/// Outcome of screening one candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Passed every gate
    Accepted,
    /// Fewer daily bars than the minimum
    InsufficientHistory,
    /// Not three straight up sessions
    NotUptrend,
    /// Cumulative rise above the ceiling
    RiseTooLarge,
    /// Cumulative rise at or below the floor
    CumulativeDecline,
    /// Volume at or below the prior session
    VolumeShrink,
    /// Volume ratio above the ceiling
    VolumeSpike,
    /// Prior session had zero volume
    PriorDayHalt,
    /// 3-day main inflow not positive
    FlowNonPositive,
    /// Provider fault while fetching this candidate
    InternalError,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReasonCode::Accepted => "入选",
            ReasonCode::InsufficientHistory => "数据不足",
            ReasonCode::NotUptrend => "非连续上涨",
            ReasonCode::RiseTooLarge => "涨幅过大",
            ReasonCode::CumulativeDecline => "累计未上涨",
            ReasonCode::VolumeShrink => "今日缩量",
            ReasonCode::VolumeSpike => "放量异常",
            ReasonCode::PriorDayHalt => "昨日停牌",
            ReasonCode::FlowNonPositive => "资金流出",
            ReasonCode::InternalError => "数据异常",
        };
        write!(f, "{}", label)
    }
}

// ============================================================================
// Funnel Output
// ============================================================================

/// One stock that passed every gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    /// Exchange code
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Latest close
    pub latest: f64,
    /// Cumulative rise over the trend window in percent
    pub cum_rise_pct: f64,
    /// Today's volume against the prior session
    pub volume_ratio: f64,
    /// Main inflow as percent of float cap (market-wide pool only)
    pub flow_intensity: Option<f64>,
    /// Total market cap in yuan
    pub total_cap: Option<f64>,
    /// Concept board that sourced this pick (sector pool only)
    pub sector: Option<String>,
}

/// Full account of one funnel run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelReport {
    /// Pool strategy that fed the funnel
    pub strategy: PoolStrategy,
    /// Candidates entering the funnel
    pub total: usize,
    /// Stocks that passed every gate
    pub picks: Vec<Pick>,
    /// Rejection tally by reason
    pub rejections: BTreeMap<ReasonCode, usize>,
}

impl FunnelReport {
    pub fn new(strategy: PoolStrategy, total: usize) -> Self {
        Self {
            strategy,
            total,
            picks: Vec::new(),
            rejections: BTreeMap::new(),
        }
    }

    pub fn record_rejection(&mut self, reason: ReasonCode) {
        *self.rejections.entry(reason).or_insert(0) += 1;
    }

    /// Total rejected candidates across every reason.
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

// ============================================================================
// Gate Evaluation
// ============================================================================

/// Metrics carried out of the bar gates into the pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarMetrics {
    pub latest: f64,
    pub cum_rise_pct: f64,
    pub volume_ratio: f64,
}

/// Run the bar gates over `bars` (oldest first, newest last).
pub fn evaluate_bars(bars: &[DailyBar], config: &FunnelConfig) -> Result<BarMetrics, ReasonCode> {
    if bars.len() < config.min_history_bars.max(TREND_SESSIONS) {
        return Err(ReasonCode::InsufficientHistory);
    }

    let window = &bars[bars.len() - TREND_SESSIONS..];
    if !window.iter().all(DailyBar::is_up_session) {
        return Err(ReasonCode::NotUptrend);
    }

    let cum_rise_pct: f64 = window.iter().map(|b| b.pct_change).sum();
    if cum_rise_pct >= config.max_cum_rise_pct {
        return Err(ReasonCode::RiseTooLarge);
    }
    if cum_rise_pct <= config.min_cum_rise_pct {
        return Err(ReasonCode::CumulativeDecline);
    }

    let today = &window[TREND_SESSIONS - 1];
    let prior = &window[TREND_SESSIONS - 2];
    if prior.volume == 0.0 {
        return Err(ReasonCode::PriorDayHalt);
    }
    let volume_ratio = today.volume / prior.volume;
    if volume_ratio <= 1.0 {
        return Err(ReasonCode::VolumeShrink);
    }
    if volume_ratio > config.max_volume_ratio {
        return Err(ReasonCode::VolumeSpike);
    }

    Ok(BarMetrics {
        latest: today.close,
        cum_rise_pct,
        volume_ratio,
    })
}

/// Run the fund-flow gate over `flows` (oldest first). Returns the 3-day
/// main inflow sum when positive.
pub fn evaluate_flow(flows: &[FlowBar]) -> Result<f64, ReasonCode> {
    if flows.is_empty() {
        return Err(ReasonCode::FlowNonPositive);
    }

    let tail = &flows[flows.len().saturating_sub(FLOW_SESSIONS)..];
    let sum: f64 = tail.iter().map(|f| f.main_net_inflow).sum();
    if sum > 0.0 {
        Ok(sum)
    } else {
        Err(ReasonCode::FlowNonPositive)
    }
}

// ============================================================================
// Funnel Engine
// ============================================================================

/// Screens a candidate pool symbol by symbol.
pub struct FunnelEngine<P: MarketDataProvider> {
    provider: Arc<P>,
    fetcher: ResilientFetcher,
    config: FunnelConfig,
}

impl<P: MarketDataProvider> FunnelEngine<P> {
    pub fn new(provider: Arc<P>, fetcher: ResilientFetcher, config: FunnelConfig) -> Self {
        Self {
            provider,
            fetcher,
            config,
        }
    }

    /// Screen every candidate, throttling between per-symbol fetches so
    /// the upstream sees a browser-paced request stream.
    pub async fn run(&self, strategy: PoolStrategy, candidates: &[Candidate]) -> FunnelReport {
        let mut report = FunnelReport::new(strategy, candidates.len());

        for (i, candidate) in candidates.iter().enumerate() {
            if i > 0 {
                self.throttle().await;
            }

            match self.screen_one(candidate).await {
                Ok(pick) => {
                    info!(
                        symbol = pick.symbol.as_str(),
                        name = pick.name.as_str(),
                        cum_rise_pct = pick.cum_rise_pct,
                        volume_ratio = pick.volume_ratio,
                        "Candidate accepted"
                    );
                    report.picks.push(pick);
                }
                Err(reason) => {
                    debug!(
                        symbol = candidate.symbol.as_str(),
                        reason = %reason,
                        "Candidate rejected"
                    );
                    report.record_rejection(reason);
                }
            }
        }

        info!(
            strategy = %strategy,
            total = report.total,
            picks = report.picks.len(),
            rejected = report.rejected(),
            "Screening funnel complete"
        );
        report
    }

    async fn screen_one(&self, candidate: &Candidate) -> Result<Pick, ReasonCode> {
        let bars = self
            .fetcher
            .fetch("daily_bars", || {
                let provider = Arc::clone(&self.provider);
                let symbol = candidate.symbol.clone();
                let limit = self.config.bar_fetch_limit;
                async move { provider.daily_bars(&symbol, limit).await }
            })
            .await;
        let bars = match bars {
            FetchOutcome::Data(bars) => bars,
            FetchOutcome::Absent => return Err(ReasonCode::InsufficientHistory),
            FetchOutcome::Fault(e) => {
                warn!(symbol = candidate.symbol.as_str(), error = %e, "Daily bars fetch failed");
                return Err(ReasonCode::InternalError);
            }
        };

        let metrics = evaluate_bars(&bars, &self.config)?;

        let flows = self
            .fetcher
            .fetch("flow_history", || {
                let provider = Arc::clone(&self.provider);
                let symbol = candidate.symbol.clone();
                async move { provider.flow_history(&symbol).await }
            })
            .await;
        let flows = match flows {
            FetchOutcome::Data(flows) => flows,
            FetchOutcome::Absent => return Err(ReasonCode::FlowNonPositive),
            FetchOutcome::Fault(e) => {
                warn!(symbol = candidate.symbol.as_str(), error = %e, "Flow history fetch failed");
                return Err(ReasonCode::InternalError);
            }
        };

        evaluate_flow(&flows)?;

        Ok(Pick {
            symbol: candidate.symbol.clone(),
            name: candidate.name.clone(),
            latest: metrics.latest,
            cum_rise_pct: metrics.cum_rise_pct,
            volume_ratio: metrics.volume_ratio,
            flow_intensity: candidate.flow_intensity,
            total_cap: candidate.total_cap,
            sector: candidate.sector.clone(),
        })
    }

    async fn throttle(&self) {
        let lo = self.config.throttle_min_ms;
        let hi = self.config.throttle_max_ms;
        let delay_ms = if hi > lo {
            use rand::Rng;
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, open: f64, close: f64, pct: f64, volume: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            open,
            close,
            high: close.max(open),
            low: close.min(open),
            volume,
            amount: volume * close,
            pct_change: pct,
        }
    }

    fn flow_bar(day: u32, inflow: f64) -> FlowBar {
        FlowBar {
            date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            main_net_inflow: inflow,
        }
    }

    /// Five bars ending in three clean up sessions with expanding volume.
    fn passing_bars() -> Vec<DailyBar> {
        vec![
            bar(2, 10.0, 9.9, -1.0, 90_000.0),
            bar(3, 9.9, 10.0, 1.0, 95_000.0),
            bar(4, 10.0, 10.2, 2.0, 100_000.0),
            bar(5, 10.2, 10.5, 3.0, 110_000.0),
            bar(6, 10.5, 10.9, 4.0, 198_000.0),
        ]
    }

    #[test]
    fn test_passing_bars_accepted() {
        let metrics = evaluate_bars(&passing_bars(), &FunnelConfig::default()).unwrap();
        assert_eq!(metrics.latest, 10.9);
        assert!((metrics.cum_rise_pct - 9.0).abs() < 1e-9);
        assert!((metrics.volume_ratio - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_short_history_rejected() {
        let bars = passing_bars()[..4].to_vec();
        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::InsufficientHistory)
        );
    }

    #[test]
    fn test_down_session_breaks_trend() {
        let mut bars = passing_bars();
        bars[3] = bar(5, 10.5, 10.2, -2.9, 110_000.0);
        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::NotUptrend)
        );
    }

    #[test]
    fn test_doji_with_positive_change_keeps_trend() {
        // Close equal to open counts as an up session when change is positive
        let mut bars = passing_bars();
        bars[3] = bar(5, 10.2, 10.2, 0.5, 110_000.0);
        assert!(evaluate_bars(&bars, &FunnelConfig::default()).is_ok());
    }

    #[test]
    fn test_cumulative_rise_ceiling() {
        let mut bars = passing_bars();
        bars[4].pct_change = 7.1; // 2 + 3 + 7.1 > 10
        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::RiseTooLarge)
        );
    }

    #[test]
    fn test_cumulative_rise_ceiling_is_tunable() {
        // 12% cumulative: out under the default (0, 10), in under (0, 15)
        let mut bars = passing_bars();
        bars[2].pct_change = 3.0;
        bars[3].pct_change = 4.0;
        bars[4].pct_change = 5.0;

        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::RiseTooLarge)
        );

        let relaxed = FunnelConfig {
            max_cum_rise_pct: 15.0,
            ..Default::default()
        };
        assert!(evaluate_bars(&bars, &relaxed).is_ok());
    }

    #[test]
    fn test_cumulative_rise_floor_when_raised() {
        let config = FunnelConfig {
            min_cum_rise_pct: 5.0,
            ..Default::default()
        };
        let mut bars = passing_bars();
        bars[2].pct_change = 0.5;
        bars[3].pct_change = 0.5;
        bars[4].pct_change = 0.5;
        assert_eq!(evaluate_bars(&bars, &config), Err(ReasonCode::CumulativeDecline));
    }

    #[test]
    fn test_volume_shrink_rejected() {
        let mut bars = passing_bars();
        bars[4].volume = 110_000.0; // equal to prior session
        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::VolumeShrink)
        );
    }

    #[test]
    fn test_volume_spike_rejected_but_ceiling_passes() {
        let mut bars = passing_bars();
        bars[4].volume = 110_000.0 * 2.5; // exactly at the ceiling
        assert!(evaluate_bars(&bars, &FunnelConfig::default()).is_ok());

        bars[4].volume = 110_000.0 * 2.51;
        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::VolumeSpike)
        );
    }

    #[test]
    fn test_prior_day_halt_rejected() {
        let mut bars = passing_bars();
        bars[3].volume = 0.0;
        assert_eq!(
            evaluate_bars(&bars, &FunnelConfig::default()),
            Err(ReasonCode::PriorDayHalt)
        );
    }

    #[test]
    fn test_flow_gate_sums_last_three_days() {
        // Old outflow beyond the window must not count
        let flows = vec![
            flow_bar(2, -9e9),
            flow_bar(4, 1e6),
            flow_bar(5, -2e6),
            flow_bar(6, 1.5e6),
        ];
        let sum = evaluate_flow(&flows).unwrap();
        assert!((sum - 5e5).abs() < 1.0);
    }

    #[test]
    fn test_flow_gate_rejects_net_outflow() {
        let flows = vec![flow_bar(4, 1e6), flow_bar(5, -2e6), flow_bar(6, 0.5e6)];
        assert_eq!(evaluate_flow(&flows), Err(ReasonCode::FlowNonPositive));
    }

    #[test]
    fn test_flow_gate_rejects_empty_history() {
        assert_eq!(evaluate_flow(&[]), Err(ReasonCode::FlowNonPositive));
    }

    #[test]
    fn test_flow_gate_handles_short_history() {
        let flows = vec![flow_bar(6, 1e6)];
        assert!(evaluate_flow(&flows).is_ok());
    }

    #[test]
    fn test_report_accounting() {
        let mut report = FunnelReport::new(PoolStrategy::MarketWide, 5);
        report.record_rejection(ReasonCode::NotUptrend);
        report.record_rejection(ReasonCode::NotUptrend);
        report.record_rejection(ReasonCode::VolumeSpike);

        assert_eq!(report.rejected(), 3);
        assert_eq!(report.rejections.get(&ReasonCode::NotUptrend), Some(&2));
        assert_eq!(report.rejections.get(&ReasonCode::VolumeShrink), None);
    }

    #[test]
    fn test_reason_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ReasonCode::FlowNonPositive).unwrap();
        assert_eq!(json, "\"flow_non_positive\"");
        let back: ReasonCode = serde_json::from_str("\"prior_day_halt\"").unwrap();
        assert_eq!(back, ReasonCode::PriorDayHalt);
    }

    #[test]
    fn test_reason_display_labels() {
        assert_eq!(ReasonCode::Accepted.to_string(), "入选");
        assert_eq!(ReasonCode::FlowNonPositive.to_string(), "资金流出");
    }
}
