//! Daily concept board ranking.
//!
//! Ranks the concept board gainer list, drops derivative boards such as
//! 昨日涨停 whose membership is an artifact of yesterday's price action,
//! and flags boards absent from the recent history window as new. A new
//! board on the top list is the earliest visible signal of sector
//! rotation, which is why the candidate pool builder treats it first.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

use crate::data::SectorQuote;
use crate::history::SectorHistory;

// ============================================================================
// Configuration
// ============================================================================

/// Sector ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorConfig {
    /// Boards whose name contains any marker are dropped before ranking
    #[serde(default = "default_noise_markers")]
    pub noise_markers: Vec<String>,
    /// How many top boards to keep
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Rolling history window in calendar days
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_noise_markers() -> Vec<String> {
    vec!["涨停".to_string(), "连板".to_string()]
}

fn default_top_k() -> usize {
    10
}

fn default_retention_days() -> i64 {
    5
}

impl Default for SectorConfig {
    fn default() -> Self {
        Self {
            noise_markers: default_noise_markers(),
            top_k: default_top_k(),
            retention_days: default_retention_days(),
        }
    }
}

// ============================================================================
// Scan Output
// ============================================================================

/// One board on the daily top list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSector {
    /// Eastmoney board code (BKxxxx)
    pub code: String,
    /// Board name
    pub name: String,
    /// Day change percent
    pub pct_change: f64,
    /// Position on the list, 1-based
    pub rank: usize,
    /// Not seen in the recent history window
    pub is_new: bool,
}

/// Result of one day's board ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorScan {
    /// Trading date
    pub date: NaiveDate,
    /// Top boards, strongest first
    pub top: Vec<RankedSector>,
}

impl SectorScan {
    /// Names of all top boards, in rank order.
    pub fn names(&self) -> Vec<String> {
        self.top.iter().map(|s| s.name.clone()).collect()
    }

    pub fn has_new(&self) -> bool {
        self.top.iter().any(|s| s.is_new)
    }
}

// ============================================================================
// Sector Ranker
// ============================================================================

/// Ranks the raw board table and marks novelty against history.
pub struct SectorRanker {
    config: SectorConfig,
}

impl SectorRanker {
    pub fn new(config: SectorConfig) -> Self {
        Self { config }
    }

    /// Rank `board` for `date`, marking boards absent from the history
    /// window as new. Boards without a change percent (all constituents
    /// suspended) are dropped.
    pub fn rank(
        &self,
        date: NaiveDate,
        board: Vec<SectorQuote>,
        history: &SectorHistory,
    ) -> SectorScan {
        let recent = history.recent_names(date, self.config.retention_days);

        let mut ranked: Vec<(SectorQuote, f64)> = board
            .into_iter()
            .filter(|b| !self.is_noise(&b.name))
            .filter_map(|b| b.pct_change.map(|pct| (b, pct)))
            .collect();

        // Stable sort keeps the upstream order for equal gains
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(self.config.top_k);

        let top: Vec<RankedSector> = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (quote, pct))| {
                let is_new = !recent.contains(&quote.name);
                RankedSector {
                    code: quote.code,
                    name: quote.name,
                    pct_change: pct,
                    rank: i + 1,
                    is_new,
                }
            })
            .collect();

        let new_count = top.iter().filter(|s| s.is_new).count();
        info!(
            date = %date,
            top = top.len(),
            new = new_count,
            "Sector ranking complete"
        );

        SectorScan { date, top }
    }

    fn is_noise(&self, name: &str) -> bool {
        self.config.noise_markers.iter().any(|m| name.contains(m))
    }
}

// ============================================================================
// Tests
// ============================================================================
