//! Daily report output.
//!
//! Every scan writes the same page twice: once under the archive as
//! `YYYY-MM-DD.html`, once as the site index, so the newest report is
//! always the landing page and older ones stay linkable.

pub mod html;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::screener::FunnelReport;
use crate::sector::SectorScan;

/// How many past reports the history section links.
const HISTORY_LINKS: usize = 7;

// ============================================================================
// Report Writer
// ============================================================================

/// Writes the daily page to the archive and the index.
pub struct ReportWriter {
    archive_dir: PathBuf,
    index_file: PathBuf,
}

impl ReportWriter {
    pub fn new(archive_dir: impl Into<PathBuf>, index_file: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            index_file: index_file.into(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Render and write the page for `date`. Returns the archive path.
    pub fn write(
        &self,
        date: NaiveDate,
        sectors: &SectorScan,
        funnel: &FunnelReport,
    ) -> Result<PathBuf> {
        // Collect history before writing today so the page never links itself
        let history = self.recent_archives(date, HISTORY_LINKS);

        std::fs::create_dir_all(&self.archive_dir).with_context(|| {
            format!("Failed to create archive dir {}", self.archive_dir.display())
        })?;
        let archive_path = self
            .archive_dir
            .join(format!("{}.html", date.format("%Y-%m-%d")));
        let archive_page = html::render_page(date, sectors, funnel, &history, "");
        std::fs::write(&archive_path, archive_page)
            .with_context(|| format!("Failed to write {}", archive_path.display()))?;

        if let Some(parent) = self.index_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create index dir {}", parent.display())
                })?;
            }
        }
        let index_page = html::render_page(date, sectors, funnel, &history, "archive/");
        std::fs::write(&self.index_file, index_page)
            .with_context(|| format!("Failed to write {}", self.index_file.display()))?;

        info!(
            archive = %archive_path.display(),
            index = %self.index_file.display(),
            "Daily report written"
        );
        Ok(archive_path)
    }

    /// Dates of past archive pages, newest first, excluding `today`.
    fn recent_archives(&self, today: NaiveDate, limit: usize) -> Vec<NaiveDate> {
        let Ok(entries) = std::fs::read_dir(&self.archive_dir) else {
            return Vec::new();
        };

        let mut dates: Vec<NaiveDate> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                let stem = name.strip_suffix(".html")?;
                NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
            })
            .filter(|d| *d != today)
            .collect();

        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.truncate(limit);
        dates
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::PoolStrategy;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn empty_scan(d: NaiveDate) -> SectorScan {
        SectorScan {
            date: d,
            top: Vec::new(),
        }
    }

    #[test]
    fn test_write_creates_archive_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(
            dir.path().join("docs").join("archive"),
            dir.path().join("docs").join("index.html"),
        );
        let today = date(2025, 6, 16);
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);

        let archive = writer.write(today, &empty_scan(today), &funnel).unwrap();

        assert!(archive.ends_with("2025-06-16.html"));
        assert!(archive.exists());
        assert!(dir.path().join("docs").join("index.html").exists());
    }

    #[test]
    fn test_recent_archives_sorted_capped_and_excludes_today() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        std::fs::create_dir_all(&archive_dir).unwrap();
        for day in 1..=9 {
            let name = format!("2025-06-{:02}.html", day);
            std::fs::write(archive_dir.join(name), "x").unwrap();
        }
        std::fs::write(archive_dir.join("notes.html"), "x").unwrap();
        std::fs::write(archive_dir.join("2025-06-05.bak"), "x").unwrap();

        let writer = ReportWriter::new(&archive_dir, dir.path().join("index.html"));
        let recent = writer.recent_archives(date(2025, 6, 9), 7);

        assert_eq!(recent.len(), 7);
        assert_eq!(recent[0], date(2025, 6, 8));
        assert_eq!(recent[6], date(2025, 6, 2));
        assert!(!recent.contains(&date(2025, 6, 9)));
    }

    #[test]
    fn test_recent_archives_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("nope"), dir.path().join("index.html"));
        assert!(writer.recent_archives(date(2025, 6, 9), 7).is_empty());
    }

    #[test]
    fn test_index_links_carry_archive_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("docs").join("archive");
        std::fs::create_dir_all(&archive_dir).unwrap();
        std::fs::write(archive_dir.join("2025-06-13.html"), "x").unwrap();

        let writer = ReportWriter::new(&archive_dir, dir.path().join("docs").join("index.html"));
        let today = date(2025, 6, 16);
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);
        writer.write(today, &empty_scan(today), &funnel).unwrap();

        let index = std::fs::read_to_string(dir.path().join("docs").join("index.html")).unwrap();
        assert!(index.contains("archive/2025-06-13.html"));

        let archived =
            std::fs::read_to_string(archive_dir.join("2025-06-16.html")).unwrap();
        assert!(archived.contains("\"2025-06-13.html\""));
    }
}
