//! Application shared state.
//!
//! Contains the extractor registry, the exchange-rate service, and
//! configuration shared across request handlers. Built once at startup and
//! read-only afterwards; the rate cache manages its own interior locking.

use crate::Config;
use crate::services::currency::ExchangeRateService;
use crate::services::registry::ExtractorRegistry;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Country-indexed extractors, fixed for the process lifetime
    pub registry: ExtractorRegistry,

    /// Exchange rate service with its in-process cache
    pub rates: ExchangeRateService,

    /// Application configuration
    pub config: Config,
}

impl AppState {
    pub fn new(registry: ExtractorRegistry, rates: ExchangeRateService, config: Config) -> Self {
        Self {
            registry,
            rates,
            config,
        }
    }
}
