//! Structured logging setup.
//!
//! Log output is either human-oriented pretty printing (the default) or
//! line-delimited JSON for shipping to a log collector, chosen by
//! `LOG_FORMAT`. Filtering is driven by `RUST_LOG`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,price_compass=debug";

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Anything other than an explicit `json` keeps the pretty printer.
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }
}

/// Installs the global tracing subscriber.
///
/// # Environment Variables
/// - `RUST_LOG`: filter directives (default: "info,price_compass=debug")
/// - `LOG_FORMAT`: "json" for collector output, anything else pretty-prints
/// - `SERVICE_NAME` / `ENVIRONMENT`: metadata stamped on the startup event
pub fn init_tracing() {
    let format = LogFormat::from_env();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt = tracing_subscriber::fmt::layer();
    let layer = match format {
        LogFormat::Json => fmt
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt
            .pretty()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).init();
    announce(format);
}

/// Emits one startup event carrying the service metadata, so every log
/// stream begins with an identifiable record.
fn announce(format: LogFormat) {
    let service =
        std::env::var("SERVICE_NAME").unwrap_or_else(|_| "price-compass".to_string());
    let environment =
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    tracing::info!(
        service = %service,
        version = env!("CARGO_PKG_VERSION"),
        environment = %environment,
        format = ?format,
        "Tracing initialized"
    );
}
