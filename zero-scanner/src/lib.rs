//! Zero Scanner Library
//!
//! Daily A-share review scanner: ranks the concept board gainer list,
//! pools candidate stocks, screens them through a trend and capital-flow
//! funnel, then publishes an HTML report and a Telegram digest.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     ScanService                       │
//! │                                                       │
//! │  ┌─────────────┐   ┌──────────────┐   ┌────────────┐  │
//! │  │   Sector    │──▶│  Candidate   │──▶│ Screening  │  │
//! │  │  Ranking &  │   │     Pool     │   │   Funnel   │  │
//! │  │   Novelty   │   │   Builder    │   │            │  │
//! │  └──────┬──────┘   └──────────────┘   └─────┬──────┘  │
//! │         │                                   │         │
//! │  ┌──────▼──────┐                     ┌──────▼──────┐  │
//! │  │   History   │                     │ HTML Report │  │
//! │  │    Store    │                     │  + TG Digest│  │
//! │  └─────────────┘                     └─────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Every upstream call goes through the resilient fetch layer in
//! [`data`], so a flaky endpoint degrades one step of the scan instead
//! of killing the run.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod data;
pub mod history;
pub mod logging;
pub mod notification;
pub mod report;
pub mod screener;
pub mod sector;

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::ScanConfig;
use crate::data::{MarketDataProvider, ResilientFetcher};
use crate::history::HistoryStore;
use crate::notification::Notifier;
use crate::report::ReportWriter;
use crate::screener::{FunnelEngine, FunnelReport, PoolBuilder};
use crate::sector::{SectorRanker, SectorScan};

pub use crate::data::EastmoneyProvider;

// ============================================================================
// Run Summary
// ============================================================================

/// What one scan produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub sectors: SectorScan,
    pub funnel: FunnelReport,
    /// Archive page path, when the report was written
    pub report_path: Option<PathBuf>,
    pub duration: Duration,
}

// ============================================================================
// Scan Service
// ============================================================================

/// Orchestrates one daily scan end to end.
pub struct ScanService<P: MarketDataProvider> {
    config: ScanConfig,
    provider: Arc<P>,
    fetcher: ResilientFetcher,
    history_store: HistoryStore,
    notifier: Notifier,
    report_writer: ReportWriter,
}

impl<P: MarketDataProvider> ScanService<P> {
    pub fn new(config: ScanConfig, provider: Arc<P>) -> Self {
        let fetcher = ResilientFetcher::new(config.fetch.clone());
        let history_store = HistoryStore::new(config.output.history_file.clone());
        let notifier = Notifier::new(config.telegram.clone());
        let report_writer = ReportWriter::new(
            config.output.archive_dir.clone(),
            config.output.index_file.clone(),
        );

        Self {
            config,
            provider,
            fetcher,
            history_store,
            notifier,
            report_writer,
        }
    }

    /// Run the scan for today.
    pub async fn run_once(&self) -> RunSummary {
        let today = chrono::Local::now().date_naive();
        self.run_for_date(today).await
    }

    /// Run the scan for a specific date. The date drives novelty
    /// detection, history recording and report naming; market data is
    /// always whatever the provider currently serves.
    pub async fn run_for_date(&self, today: NaiveDate) -> RunSummary {
        let started = Instant::now();
        info!(
            date = %today,
            strategy = %self.config.strategy,
            provider = self.provider.name(),
            "Daily scan starting"
        );

        let mut history = self.history_store.load();

        let board = self
            .fetcher
            .fetch("sector_board", || {
                let provider = Arc::clone(&self.provider);
                async move { provider.sector_board().await }
            })
            .await;
        let board = board.data().unwrap_or_else(|| {
            warn!("Sector board unavailable, scanning without sector signal");
            Vec::new()
        });

        let ranker = SectorRanker::new(self.config.sector.clone());
        let sectors = ranker.rank(today, board, &history);

        let pool_builder = PoolBuilder::new(
            Arc::clone(&self.provider),
            self.fetcher.clone(),
            self.config.pool.clone(),
        );
        let candidates = pool_builder.build(self.config.strategy, &sectors).await;

        let engine = FunnelEngine::new(
            Arc::clone(&self.provider),
            self.fetcher.clone(),
            self.config.funnel.clone(),
        );
        let funnel = engine.run(self.config.strategy, &candidates).await;

        let report_path = match self.report_writer.write(today, &sectors, &funnel) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %e, "Failed to write daily report");
                None
            }
        };

        let page_url = self.config.output.page_url(today);
        let digest = notification::digest_text(today, &sectors, &funnel, page_url.as_deref());
        self.notifier.send_digest(&digest).await;

        // An empty board day leaves history untouched so one outage
        // cannot flag every sector as new tomorrow
        if !sectors.top.is_empty() {
            history.record(today, sectors.names());
            self.history_store.save(&history);
        }

        let duration = started.elapsed();
        info!(
            date = %today,
            candidates = candidates.len(),
            picks = funnel.picks.len(),
            duration_secs = duration.as_secs_f64(),
            "Daily scan complete"
        );

        RunSummary {
            date: today,
            sectors,
            funnel,
            report_path,
            duration,
        }
    }
}
