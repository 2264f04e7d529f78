//! Currency detection, conversion, and exchange rate management.
//!
//! Provides accurate currency handling using Decimal for precision, with
//! provider rates cached in-process per base currency under a TTL.

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;

use crate::AppError;
use crate::config::ExchangeRateConfig;

/// Supported currencies with ISO 4217 codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    BRL, // Brazilian Real
    USD, // US Dollar
    EUR, // Euro
    GBP, // British Pound
}

impl Currency {
    /// Returns the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::BRL => "R$",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// Returns the currency code (ISO 4217).
    pub fn code(&self) -> &'static str {
        match self {
            Currency::BRL => "BRL",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }
}

impl FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BRL" => Ok(Currency::BRL),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            other => Err(AppError::Parse(format!("Unsupported currency: {}", other))),
        }
    }
}

/// Detects a currency from symbols or codes inside a price string.
///
/// Returns `None` when the string carries no signal; callers fall back to
/// the site default, then the country default, in that order.
pub fn detect_currency(price_str: &str) -> Option<Currency> {
    // R$ must be checked before the bare dollar sign
    if price_str.contains("R$") {
        return Some(Currency::BRL);
    }
    if price_str.contains('€') {
        return Some(Currency::EUR);
    }
    if price_str.contains('£') {
        return Some(Currency::GBP);
    }
    if price_str.contains('$') {
        return Some(Currency::USD);
    }

    let upper = price_str.to_uppercase();
    for currency in [Currency::BRL, Currency::EUR, Currency::GBP, Currency::USD] {
        if upper.contains(currency.code()) {
            return Some(currency);
        }
    }

    None
}

/// Parses a price string with locale-aware separators.
///
/// When both `.` and `,` appear, the rightmost one is the decimal
/// separator (`1.006,05` and `1,006.05` both mean 1006.05). A single
/// separator kind that repeats, or has exactly three trailing digits, is a
/// thousands separator; otherwise it is the decimal point.
pub fn parse_price(price_str: &str) -> Result<Decimal, AppError> {
    let cleaned: String = price_str
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Parse(format!(
            "No numeric value found in price: {}",
            price_str
        )));
    }

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let normalized = if has_dot && has_comma {
        let dot_pos = cleaned.rfind('.').unwrap();
        let comma_pos = cleaned.rfind(',').unwrap();
        if comma_pos > dot_pos {
            // European: 1.006,05
            cleaned.replace('.', "").replace(',', ".")
        } else {
            // US: 1,006.05
            cleaned.replace(',', "")
        }
    } else if has_dot || has_comma {
        let separator = if has_dot { '.' } else { ',' };
        normalize_single_separator(&cleaned, separator)
    } else {
        cleaned
    };

    Decimal::from_str(&normalized)
        .map_err(|_| AppError::Parse(format!("Invalid price format: {}", price_str)))
}

/// Resolves a lone separator kind to thousands or decimal.
fn normalize_single_separator(cleaned: &str, separator: char) -> String {
    let occurrences = cleaned.matches(separator).count();
    let last_pos = cleaned.rfind(separator).unwrap();
    let digits_after = cleaned.len() - last_pos - 1;

    // Repeated separators (1.006.789) or a 3-digit group (4.553) are
    // thousands grouping; anything else is the decimal point.
    if occurrences > 1 || digits_after == 3 {
        cleaned.replace(separator, "")
    } else if separator == ',' {
        cleaned.replace(',', ".")
    } else {
        cleaned.to_string()
    }
}

/// Exchange rate API response structure (ExchangeRate-API v6 format).
#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    result: String,
    base_code: String,
    conversion_rates: HashMap<String, f64>,
}

/// One cached rate table: 1 unit of the base equals `rates[code]` units of
/// the target currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    pub rates: HashMap<String, Decimal>,
    pub fetched_at: DateTime<Utc>,
}

/// Snapshot of one cache entry for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub base: String,
    pub fetched_at: DateTime<Utc>,
    pub size: usize,
}

/// Exchange-rate service with a per-base in-process TTL cache.
///
/// Degrades instead of failing: provider outages fall back to the stale
/// entry when one exists, and to identity conversion otherwise.
pub struct ExchangeRateService {
    http_client: Client,
    config: ExchangeRateConfig,
    cache: RwLock<HashMap<String, RateTable>>,
}

impl ExchangeRateService {
    pub fn new(http_client: Client, config: ExchangeRateConfig) -> Self {
        Self {
            http_client,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the rate table for a base currency, identity on failure.
    pub async fn get_rates(&self, base: &str) -> HashMap<String, Decimal> {
        let base = base.trim().to_uppercase();
        match self.table(&base).await {
            Some(table) => table.rates,
            None => HashMap::from([(base, Decimal::ONE)]),
        }
    }

    /// Rate from one currency to another.
    ///
    /// `None` when the currencies are equal or no real rate is available;
    /// identity tables never produce a rate.
    pub async fn rate(&self, from: &str, to: &str) -> Option<Decimal> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from == to {
            return None;
        }

        let table = self.table(&from).await?;
        table
            .rates
            .get(&to)
            .copied()
            .filter(|rate| *rate > Decimal::ZERO)
    }

    /// Converts an amount, returning it unchanged when no rate exists.
    pub async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Decimal {
        match self.rate(from, to).await {
            Some(rate) => amount * rate,
            None => amount,
        }
    }

    /// One entry per cached base currency.
    pub async fn cache_status(&self) -> Vec<CacheStatus> {
        let cache = self.cache.read().await;
        let mut entries: Vec<CacheStatus> = cache
            .iter()
            .map(|(base, table)| CacheStatus {
                base: base.clone(),
                fetched_at: table.fetched_at,
                size: table.rates.len(),
            })
            .collect();
        entries.sort_by(|a, b| a.base.cmp(&b.base));
        entries
    }

    /// Drops every cached table.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
        tracing::info!("Exchange rate cache cleared");
    }

    fn is_fresh(&self, table: &RateTable) -> bool {
        let age = Utc::now().signed_duration_since(table.fetched_at);
        age.num_seconds() >= 0 && (age.num_seconds() as u64) < self.config.ttl_seconds
    }

    /// Cached-or-refreshed table for a base; `None` means identity.
    async fn table(&self, base: &str) -> Option<RateTable> {
        {
            let cache = self.cache.read().await;
            if let Some(table) = cache.get(base) {
                if self.is_fresh(table) {
                    return Some(table.clone());
                }
            }
        }

        let api_key = match &self.config.api_key {
            Some(key) => key.clone(),
            None => {
                tracing::debug!(base = %base, "No exchange rate API key, using identity conversion");
                return None;
            }
        };

        // Double-checked under the write lock so concurrent misses refresh once
        let mut cache = self.cache.write().await;
        if let Some(table) = cache.get(base) {
            if self.is_fresh(table) {
                return Some(table.clone());
            }
        }

        match self.fetch_table(base, &api_key).await {
            Ok(table) => {
                cache.insert(base.to_string(), table.clone());
                Some(table)
            }
            Err(e) => {
                if let Some(stale) = cache.get(base) {
                    tracing::warn!(
                        base = %base,
                        error = %e,
                        fetched_at = %stale.fetched_at,
                        "Rate refresh failed, serving stale table"
                    );
                    Some(stale.clone())
                } else {
                    tracing::warn!(base = %base, error = %e, "Rate fetch failed, using identity conversion");
                    None
                }
            }
        }
    }

    async fn fetch_table(&self, base: &str, api_key: &str) -> Result<RateTable, AppError> {
        let url = format!(
            "{}/{}/latest/{}",
            self.config.api_url.trim_end_matches('/'),
            api_key,
            base
        );

        crate::observability::record_rate_api_call();

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExchangeRate(format!("Rate request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExchangeRate(format!(
                "Rate provider returned {}",
                response.status()
            )));
        }

        let api_response: ExchangeRateResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExchangeRate(format!("Invalid rate payload: {}", e)))?;

        if api_response.result != "success" {
            return Err(AppError::ExchangeRate(format!(
                "Rate provider result: {}",
                api_response.result
            )));
        }

        let mut rates: HashMap<String, Decimal> = api_response
            .conversion_rates
            .into_iter()
            .filter_map(|(code, rate)| {
                Decimal::from_f64(rate)
                    .filter(|r| *r > Decimal::ZERO)
                    .map(|r| (code, r))
            })
            .collect();

        // The base always maps to exactly 1
        rates.insert(api_response.base_code, Decimal::ONE);
        rates.insert(base.to_string(), Decimal::ONE);

        tracing::info!(base = %base, size = rates.len(), "Fetched exchange rates");

        Ok(RateTable {
            rates,
            fetched_at: Utc::now(),
        })
    }

    /// Seeds a table directly, bypassing the provider.
    #[cfg(test)]
    pub(crate) async fn prime(&self, base: &str, rates: HashMap<String, Decimal>) {
        let mut cache = self.cache.write().await;
        cache.insert(
            base.to_uppercase(),
            RateTable {
                rates,
                fetched_at: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_detect_currency_symbols() {
        assert_eq!(detect_currency("R$ 4.553,30"), Some(Currency::BRL));
        assert_eq!(detect_currency("€1.299,99"), Some(Currency::EUR));
        assert_eq!(detect_currency("£999"), Some(Currency::GBP));
        assert_eq!(detect_currency("$1,299.99"), Some(Currency::USD));
        assert_eq!(detect_currency("US$ 50"), Some(Currency::USD));
        assert_eq!(detect_currency("4553.30"), None);
    }

    #[test]
    fn test_detect_currency_codes() {
        assert_eq!(detect_currency("1.299,99 BRL"), Some(Currency::BRL));
        assert_eq!(detect_currency("999 gbp"), Some(Currency::GBP));
    }

    #[test]
    fn test_parse_price_both_separators() {
        assert_eq!(parse_price("1.006,05").unwrap(), dec("1006.05"));
        assert_eq!(parse_price("1,006.05").unwrap(), dec("1006.05"));
        assert_eq!(parse_price("R$ 11.498,88").unwrap(), dec("11498.88"));
        assert_eq!(parse_price("$1,299.99").unwrap(), dec("1299.99"));
    }

    #[test]
    fn test_parse_price_single_separator() {
        // three digits after a lone separator means thousands grouping
        assert_eq!(parse_price("4.553").unwrap(), dec("4553"));
        assert_eq!(parse_price("50,000").unwrap(), dec("50000"));
        // anything else is the decimal point
        assert_eq!(parse_price("59,9").unwrap(), dec("59.9"));
        assert_eq!(parse_price("50,00").unwrap(), dec("50.00"));
        assert_eq!(parse_price("12.50").unwrap(), dec("12.50"));
        // repeated separators are always thousands
        assert_eq!(parse_price("1.006.789").unwrap(), dec("1006789"));
        assert_eq!(parse_price("1,234,567").unwrap(), dec("1234567"));
    }

    #[test]
    fn test_parse_price_plain_and_invalid() {
        assert_eq!(parse_price("1299").unwrap(), dec("1299"));
        assert_eq!(parse_price("  € 18 ").unwrap(), dec("18"));
        assert!(parse_price("").is_err());
        assert!(parse_price("price unavailable").is_err());
        assert!(parse_price("R$ ,").is_err());
    }

    #[test]
    fn test_parse_price_round_trip_by_locale() {
        // formatted representation -> decimal -> canonical string
        let cases = [
            ("1.006,05", "1006.05"),
            ("1,006.05", "1006.05"),
            ("4.553,30", "4553.30"),
            ("3776,64", "3776.64"),
            ("5999.00", "5999.00"),
        ];
        for (formatted, canonical) in cases {
            assert_eq!(parse_price(formatted).unwrap().to_string(), canonical);
        }
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!(Currency::from_str("brl").unwrap(), Currency::BRL);
        assert_eq!(Currency::from_str(" EUR ").unwrap(), Currency::EUR);
        assert!(Currency::from_str("ZZZ").is_err());
    }

    fn provider_body(base: &str) -> String {
        format!(
            r#"{{"result":"success","base_code":"{}","conversion_rates":{{"BRL":1.0,"EUR":0.18,"USD":0.19,"GBP":0.15}}}}"#,
            base
        )
    }

    fn service_with(url: String, key: Option<&str>, ttl: u64) -> ExchangeRateService {
        ExchangeRateService::new(
            Client::new(),
            ExchangeRateConfig {
                api_key: key.map(|k| k.to_string()),
                api_url: url,
                ttl_seconds: ttl,
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_and_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/k1/latest/BRL")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(provider_body("BRL"))
            .expect(1)
            .create_async()
            .await;

        let service = service_with(server.url(), Some("k1"), 3600);

        let rates = service.get_rates("BRL").await;
        assert_eq!(rates.get("EUR"), Some(&dec("0.18")));
        assert_eq!(rates.get("BRL"), Some(&Decimal::ONE));

        // second call is served from cache
        let rate = service.rate("BRL", "EUR").await;
        assert_eq!(rate, Some(dec("0.18")));
        mock.assert_async().await;

        let status = service.cache_status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].base, "BRL");
        assert!(status[0].size >= 4);

        service.clear().await;
        assert!(service.cache_status().await.is_empty());
    }

    #[tokio::test]
    async fn test_outage_without_cache_is_identity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/k1/latest/BRL")
            .with_status(500)
            .create_async()
            .await;

        let service = service_with(server.url(), Some("k1"), 3600);

        assert_eq!(service.rate("BRL", "EUR").await, None);
        let rates = service.get_rates("BRL").await;
        assert_eq!(rates.len(), 1);
        assert_eq!(rates.get("BRL"), Some(&Decimal::ONE));
    }

    #[tokio::test]
    async fn test_stale_table_survives_outage() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/k1/latest/BRL")
            .with_status(200)
            .with_body(provider_body("BRL"))
            .expect(1)
            .create_async()
            .await;

        // ttl 0 expires entries immediately, forcing the refresh path
        let service = service_with(server.url(), Some("k1"), 0);
        assert_eq!(service.rate("BRL", "EUR").await, Some(dec("0.18")));
        ok.assert_async().await;
        ok.remove_async().await;

        server
            .mock("GET", "/k1/latest/BRL")
            .with_status(503)
            .create_async()
            .await;

        // refresh fails but the stale entry still answers
        assert_eq!(service.rate("BRL", "EUR").await, Some(dec("0.18")));
    }

    #[tokio::test]
    async fn test_no_api_key_skips_network() {
        let service = service_with("http://127.0.0.1:9".to_string(), None, 3600);
        assert_eq!(service.rate("BRL", "EUR").await, None);
        assert_eq!(
            service.convert(dec("100"), "BRL", "EUR").await,
            dec("100")
        );
    }

    #[tokio::test]
    async fn test_same_currency_has_no_rate() {
        let service = service_with("http://127.0.0.1:9".to_string(), Some("k"), 3600);
        assert_eq!(service.rate("EUR", "EUR").await, None);
        assert_eq!(service.convert(dec("5"), "EUR", "eur").await, dec("5"));
    }

    #[tokio::test]
    async fn test_convert_with_primed_table() {
        let service = service_with("http://127.0.0.1:9".to_string(), None, 3600);
        service
            .prime(
                "BRL",
                HashMap::from([
                    ("BRL".to_string(), Decimal::ONE),
                    ("EUR".to_string(), dec("0.18")),
                ]),
            )
            .await;

        assert_eq!(
            service.convert(dec("10000"), "BRL", "EUR").await,
            dec("1800.00")
        );
        // unknown target currency degrades to no conversion
        assert_eq!(service.rate("BRL", "ZZZ").await, None);
        assert_eq!(service.convert(dec("7"), "BRL", "ZZZ").await, dec("7"));
    }
}
