//! Zero Scanner - daily A-share review pipeline for the Zero ecosystem
//!
//! One-shot binary: an external scheduler (cron, GitHub Actions) runs it
//! once after the close, it scans, writes the report, pushes the digest
//! and exits.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use zero_scanner::config::ScanConfig;
use zero_scanner::{logging, EastmoneyProvider, ScanService};

#[tokio::main]
async fn main() -> Result<()> {
    let startup = Instant::now();

    logging::init_from_env();
    tracing::info!("Zero Scanner v{}", env!("CARGO_PKG_VERSION"));

    let config = ScanConfig::from_env();
    let provider = Arc::new(EastmoneyProvider::new());
    let service = ScanService::new(config, provider);

    tracing::info!(
        duration_ms = startup.elapsed().as_millis() as u64,
        "Startup complete"
    );

    service.run_once().await;

    Ok(())
}
