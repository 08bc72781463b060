//! Sector history persistence.
//!
//! Keeps a date-keyed record of which concept boards topped the daily
//! ranking, so the next run can tell a freshly igniting theme from one
//! that has been hot all week. Stored as a single JSON file mapping
//! "YYYY-MM-DD" to board names.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

// ============================================================================
// Sector History
// ============================================================================

/// Date-keyed record of top-ranked board names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorHistory(pub BTreeMap<String, Vec<String>>);

impl SectorHistory {
    /// Board names seen in the rolling window before `today`.
    ///
    /// The window covers the `retention_days` calendar days ending
    /// yesterday. Today's own entry is excluded so that re-running the
    /// scan on the same date does not mark its own output as stale.
    pub fn recent_names(&self, today: NaiveDate, retention_days: i64) -> HashSet<String> {
        let cutoff = today - Duration::days(retention_days);

        let mut names = HashSet::new();
        for (key, boards) in &self.0 {
            let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") else {
                warn!(key = key.as_str(), "Invalid history date key, skipping");
                continue;
            };
            if date > cutoff && date != today {
                names.extend(boards.iter().cloned());
            }
        }
        names
    }

    /// Record the boards for `date`, replacing any previous entry.
    /// Empty lists are not recorded.
    pub fn record(&mut self, date: NaiveDate, names: Vec<String>) {
        if names.is_empty() {
            return;
        }
        self.0.insert(date.format("%Y-%m-%d").to_string(), names);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ============================================================================
// History Store
// ============================================================================

/// File-backed store for [`SectorHistory`].
///
/// Load never fails: a missing file means a first run and a corrupt file
/// is treated as empty so one bad write cannot wedge every later scan.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load history from disk, falling back to empty.
    pub fn load(&self) -> SectorHistory {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No history file yet, starting empty");
                return SectorHistory::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read history file, starting empty");
                return SectorHistory::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(history) => history,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "History file corrupt, starting empty");
                SectorHistory::default()
            }
        }
    }

    /// Persist history to disk. Failures are logged, not propagated,
    /// so a read-only disk cannot abort a scan that already produced
    /// its report.
    pub fn save(&self, history: &SectorHistory) {
        if let Err(e) = self.try_save(history) {
            error!(path = %self.path.display(), error = %e, "Failed to save sector history");
        } else {
            debug!(path = %self.path.display(), entries = history.len(), "Sector history saved");
        }
    }

    fn try_save(&self, history: &SectorHistory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(history)
            .context("Failed to serialize sector history")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
