//! Logging initialization.
//!
//! Structured tracing with a pretty console format by default and JSON
//! for scheduled runs whose output lands in CI logs. `RUST_LOG` wins
//! over everything when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HTTP stack modules quieted to warn unless RUST_LOG says otherwise.
const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls", "tokio_util"];

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = log_level.to_string();
        for module in NOISY_MODULES {
            directives.push_str(&format!(",{}=warn", module));
        }
        EnvFilter::new(directives)
    })
}

/// Initialize logging from `LOG_LEVEL` and `LOG_FORMAT`.
pub fn init_from_env() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    init_logging(&level, &format);
}

/// Initialize the global subscriber. Safe to call more than once; later
/// calls keep the first subscriber.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);

    if log_format == "json" {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    } else {
        let layer = fmt::layer().with_ansi(true).with_target(true);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    }

    tracing::info!(
        log_level = log_level,
        log_format = log_format,
        "Logging initialized"
    );
}
