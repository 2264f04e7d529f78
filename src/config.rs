//! Application configuration management.
//!
//! Loads configuration from environment variables using dotenvy.

use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub fetcher: FetcherConfig,
    pub exchange_rate: ExchangeRateConfig,
    pub aggregator: AggregatorConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Outbound HTTP behavior for the scraping fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User-agent pool; one is picked per attempt
    pub user_agents: Vec<String>,
    pub request_timeout_seconds: u64,
    /// Total attempts per request, including the first
    pub max_retries: u32,
    /// Uniform random pre-attempt delay bounds
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Linear backoff step between retry attempts, capped at 5x
    pub backoff_base_ms: u64,
}

/// Exchange rate provider and cache configuration.
#[derive(Debug, Clone)]
pub struct ExchangeRateConfig {
    /// Provider key; absent means identity conversion only
    pub api_key: Option<String>,
    pub api_url: String,
    pub ttl_seconds: u64,
}

/// Fan-out behavior of the comparison aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub deadline_seconds: u64,
    pub default_limit: usize,
}

/// Browser-plausible defaults used when USER_AGENTS is not set.
const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(String)` - Missing or invalid environment variable
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .or_else(|_| env::var("SERVER_PORT"))
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid PORT: {}", e))?,
            },
            fetcher: FetcherConfig {
                user_agents: env::var("USER_AGENTS")
                    .map(|raw| {
                        raw.split(',')
                            .map(|ua| ua.trim().to_string())
                            .filter(|ua| !ua.is_empty())
                            .collect()
                    })
                    .ok()
                    .filter(|pool: &Vec<String>| !pool.is_empty())
                    .unwrap_or_else(|| {
                        DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
                    }),
                request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid REQUEST_TIMEOUT_SECONDS: {}", e))?,
                max_retries: env::var("MAX_RETRIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid MAX_RETRIES: {}", e))?,
                min_delay_ms: env::var("FETCH_MIN_DELAY_MS")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid FETCH_MIN_DELAY_MS: {}", e))?,
                max_delay_ms: env::var("FETCH_MAX_DELAY_MS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid FETCH_MAX_DELAY_MS: {}", e))?,
                backoff_base_ms: env::var("FETCH_BACKOFF_BASE_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid FETCH_BACKOFF_BASE_MS: {}", e))?,
            },
            exchange_rate: ExchangeRateConfig {
                api_key: env::var("EXCHANGE_RATE_API_KEY").ok().filter(|k| !k.is_empty()),
                api_url: env::var("EXCHANGE_RATE_API_URL")
                    .unwrap_or_else(|_| "https://v6.exchangerate-api.com/v6".to_string()),
                ttl_seconds: env::var("EXCHANGE_RATE_TTL_SECONDS")
                    .unwrap_or_else(|_| "18000".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid EXCHANGE_RATE_TTL_SECONDS: {}", e))?,
            },
            aggregator: AggregatorConfig {
                deadline_seconds: env::var("AGGREGATION_DEADLINE_SECONDS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid AGGREGATION_DEADLINE_SECONDS: {}", e))?,
                default_limit: env::var("DEFAULT_RESULT_LIMIT")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .map_err(|e| format!("Invalid DEFAULT_RESULT_LIMIT: {}", e))?,
            },
        })
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            request_timeout_seconds: 15,
            max_retries: 3,
            min_delay_ms: 100,
            max_delay_ms: 600,
            backoff_base_ms: 500,
        }
    }
}

impl Default for ExchangeRateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://v6.exchangerate-api.com/v6".to_string(),
            ttl_seconds: 18000,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            deadline_seconds: 20,
            default_limit: 10,
        }
    }
}
