//! Observability module for metrics, tracing, and logging.

pub mod metrics;
pub mod middleware;
pub mod tracing_setup;

pub use metrics::{
    init_metrics, record_comparison, record_extractor_request, record_rate_api_call,
};
pub use middleware::track_metrics;
pub use tracing_setup::init_tracing;
