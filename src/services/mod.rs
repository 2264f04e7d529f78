//! Comparison aggregation across site extractors.
//!
//! This module coordinates the concurrent fan-out over the selected
//! extractors, isolates per-extractor failures, applies currency
//! conversion, and shapes the per-country ordering of the response.

pub mod currency;
pub mod registry;

use futures::future::join_all;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::AggregatorConfig;
use crate::country::Country;
use crate::models::{ConvertedPrice, ProductComparison};
use crate::observability;
use currency::ExchangeRateService;
use registry::{ExtractorRegistry, SelectionPolicy};

/// One validated comparison request.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub query: String,
    pub base: Country,
    pub current: Option<Country>,
    /// Uppercased ISO code; unknown codes simply disable conversion
    pub target_currency: String,
    pub use_macro_region: bool,
    pub limit: usize,
}

/// Runs the full comparison pipeline and returns the merged offer list.
///
/// Extractor failures, panics, and deadline overruns each contribute zero
/// offers; the request itself never fails here.
pub async fn get_product_comparisons(
    request: &ComparisonRequest,
    registry: &ExtractorRegistry,
    rates: &ExchangeRateService,
    config: &AggregatorConfig,
) -> Vec<ProductComparison> {
    let selected = registry.select(&SelectionPolicy {
        base: request.base,
        current: request.current,
        use_macro_region: request.use_macro_region,
    });

    tracing::info!(
        query = %request.query,
        base = %request.base,
        extractors = selected.len(),
        use_macro_region = request.use_macro_region,
        "Starting comparison fan-out"
    );

    // Country output order follows the selection, base country first
    let mut country_order: Vec<Country> = Vec::new();
    for extractor in &selected {
        if !country_order.contains(&extractor.country()) {
            country_order.push(extractor.country());
        }
    }

    let deadline = Duration::from_secs(config.deadline_seconds);
    let tasks = selected.into_iter().map(|extractor| {
        let query = request.query.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = timeout(deadline, extractor.get_comparisons(&query)).await;
            (extractor, started.elapsed(), result)
        })
    });

    let mut offers: Vec<ProductComparison> = Vec::new();
    for joined in join_all(tasks).await {
        match joined {
            // a panicking extractor must not take the request down
            Err(join_error) => {
                tracing::error!(error = %join_error, "Extractor task panicked");
            }
            Ok((extractor, elapsed, result)) => match result {
                Err(_) => {
                    observability::record_extractor_request(extractor.id(), false, elapsed);
                    tracing::warn!(
                        extractor = extractor.id(),
                        deadline_s = config.deadline_seconds,
                        "Deadline exceeded, 0 offers"
                    );
                }
                Ok(Err(e)) => {
                    observability::record_extractor_request(extractor.id(), false, elapsed);
                    tracing::warn!(extractor = extractor.id(), error = %e, "0 offers");
                }
                Ok(Ok(list)) => {
                    observability::record_extractor_request(extractor.id(), true, elapsed);
                    tracing::debug!(
                        extractor = extractor.id(),
                        offers = list.len(),
                        "Extractor finished"
                    );
                    offers.extend(list);
                }
            },
        }
    }

    convert_offers(&mut offers, rates, &request.target_currency).await;

    arrange(offers, &country_order, request.limit)
}

/// Attaches `converted_price` to offers whose currency differs from the
/// target, whenever a real rate is available.
async fn convert_offers(
    offers: &mut [ProductComparison],
    rates: &ExchangeRateService,
    target_currency: &str,
) {
    for offer in offers.iter_mut() {
        if offer.currency == target_currency {
            continue;
        }
        if let Some(rate) = rates.rate(&offer.currency, target_currency).await {
            offer.converted_price = Some(ConvertedPrice {
                price: (offer.price * rate).round_dp(2),
                currency: target_currency.to_string(),
            });
        }
    }
}

/// Groups by country in the given order, sorts each group by effective
/// price (ties by store name, then id), and truncates to the limit.
fn arrange(
    offers: Vec<ProductComparison>,
    country_order: &[Country],
    limit: usize,
) -> Vec<ProductComparison> {
    let mut groups: HashMap<Country, Vec<ProductComparison>> = HashMap::new();
    for offer in offers {
        groups.entry(offer.country).or_default().push(offer);
    }

    let mut merged = Vec::new();
    for country in country_order {
        let Some(mut group) = groups.remove(country) else {
            continue;
        };
        group.sort_by(|a, b| {
            a.effective_price()
                .cmp(&b.effective_price())
                .then_with(|| a.store_name.cmp(&b.store_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        group.truncate(limit);
        merged.extend(group);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Arc;

    use crate::AppError;
    use crate::config::ExchangeRateConfig;
    use crate::extractors::Extractor;

    enum Behavior {
        Offers(Vec<&'static str>),
        Fail,
        Panic,
        Sleep(u64),
    }

    struct StubExtractor {
        id: &'static str,
        country: Country,
        currency: &'static str,
        behavior: Behavior,
    }

    impl StubExtractor {
        fn offer(&self, price: &str) -> ProductComparison {
            ProductComparison {
                id: ProductComparison::new_id(),
                product_name: format!("offer {}", price),
                price: Decimal::from_str(price).unwrap(),
                currency: self.currency.to_string(),
                store_name: self.id.to_string(),
                store_url: None,
                image_url: None,
                country: self.country,
                condition: None,
                description: None,
                converted_price: None,
                last_updated: Some(Utc::now()),
            }
        }
    }

    #[async_trait]
    impl Extractor for StubExtractor {
        fn id(&self) -> &'static str {
            self.id
        }

        fn country(&self) -> Country {
            self.country
        }

        fn base_url(&self) -> &'static str {
            "https://stub.test"
        }

        async fn get_comparisons(
            &self,
            _query: &str,
        ) -> Result<Vec<ProductComparison>, AppError> {
            match &self.behavior {
                Behavior::Offers(prices) => {
                    Ok(prices.iter().map(|p| self.offer(p)).collect())
                }
                Behavior::Fail => Err(AppError::Blocked {
                    status: 403,
                    url: "https://stub.test".to_string(),
                }),
                Behavior::Panic => panic!("extractor bug"),
                Behavior::Sleep(seconds) => {
                    tokio::time::sleep(Duration::from_secs(*seconds)).await;
                    Ok(vec![self.offer("1.00")])
                }
            }
        }
    }

    fn identity_rates() -> ExchangeRateService {
        ExchangeRateService::new(reqwest::Client::new(), ExchangeRateConfig::default())
    }

    fn request(base: Country, currency: &str, limit: usize) -> ComparisonRequest {
        ComparisonRequest {
            query: "iphone".to_string(),
            base,
            current: None,
            target_currency: currency.to_string(),
            use_macro_region: false,
            limit,
        }
    }

    fn registry(stubs: Vec<StubExtractor>) -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        for stub in stubs {
            registry.register(Arc::new(stub)).unwrap();
        }
        registry
    }

    fn prices(offers: &[ProductComparison]) -> Vec<String> {
        offers.iter().map(|o| o.price.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sorts_and_limits_single_country() {
        let registry = registry(vec![StubExtractor {
            id: "br-stub",
            country: Country::BR,
            currency: "BRL",
            behavior: Behavior::Offers(vec![
                "4553.30", "5108.90", "3776.64", "5221.11", "5999.00", "11498.88", "3887.73",
                "7998.84", "4699.00", "8221.11",
            ]),
        }]);

        let offers = get_product_comparisons(
            &request(Country::BR, "BRL", 5),
            &registry,
            &identity_rates(),
            &AggregatorConfig::default(),
        )
        .await;

        assert_eq!(
            prices(&offers),
            vec!["3776.64", "3887.73", "4553.30", "4699.00", "5108.90"]
        );
        for offer in &offers {
            assert_eq!(offer.country, Country::BR);
            assert_eq!(offer.currency, "BRL");
            assert!(offer.converted_price.is_none());
        }
    }

    #[tokio::test]
    async fn test_conversion_and_country_group_order() {
        let registry = registry(vec![
            StubExtractor {
                id: "br-stub",
                country: Country::BR,
                currency: "BRL",
                behavior: Behavior::Offers(vec!["10000"]),
            },
            StubExtractor {
                id: "pt-stub",
                country: Country::PT,
                currency: "EUR",
                behavior: Behavior::Offers(vec!["1800"]),
            },
        ]);

        let rates = identity_rates();
        rates
            .prime(
                "BRL",
                HashMap::from([
                    ("BRL".to_string(), Decimal::ONE),
                    ("EUR".to_string(), Decimal::from_str("0.18").unwrap()),
                ]),
            )
            .await;

        let mut req = request(Country::BR, "EUR", 10);
        req.current = Some(Country::PT);

        let offers = get_product_comparisons(
            &req,
            &registry,
            &rates,
            &AggregatorConfig::default(),
        )
        .await;

        assert_eq!(offers.len(), 2);
        // BR group first, then PT
        assert_eq!(offers[0].country, Country::BR);
        let converted = offers[0].converted_price.as_ref().unwrap();
        assert_eq!(converted.price, Decimal::from_str("1800.00").unwrap());
        assert_eq!(converted.currency, "EUR");

        assert_eq!(offers[1].country, Country::PT);
        assert!(offers[1].converted_price.is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_survivors() {
        let registry = registry(vec![
            StubExtractor {
                id: "blocked",
                country: Country::BR,
                currency: "BRL",
                behavior: Behavior::Fail,
            },
            StubExtractor {
                id: "panicking",
                country: Country::BR,
                currency: "BRL",
                behavior: Behavior::Panic,
            },
            StubExtractor {
                id: "healthy",
                country: Country::BR,
                currency: "BRL",
                behavior: Behavior::Offers(vec!["99.90", "49.90"]),
            },
        ]);

        let offers = get_product_comparisons(
            &request(Country::BR, "BRL", 10),
            &registry,
            &identity_rates(),
            &AggregatorConfig::default(),
        )
        .await;

        assert_eq!(prices(&offers), vec!["49.90", "99.90"]);
        assert!(offers.iter().all(|o| o.store_name == "healthy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_drops_slow_extractor() {
        let registry = registry(vec![
            StubExtractor {
                id: "slow",
                country: Country::BR,
                currency: "BRL",
                behavior: Behavior::Sleep(60),
            },
            StubExtractor {
                id: "fast",
                country: Country::BR,
                currency: "BRL",
                behavior: Behavior::Offers(vec!["10.00"]),
            },
        ]);

        let offers = get_product_comparisons(
            &request(Country::BR, "BRL", 10),
            &registry,
            &identity_rates(),
            &AggregatorConfig {
                deadline_seconds: 20,
                default_limit: 10,
            },
        )
        .await;

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].store_name, "fast");
    }

    #[tokio::test]
    async fn test_unknown_target_currency_disables_conversion() {
        let registry = registry(vec![StubExtractor {
            id: "br-stub",
            country: Country::BR,
            currency: "BRL",
            behavior: Behavior::Offers(vec!["100.00"]),
        }]);

        let offers = get_product_comparisons(
            &request(Country::BR, "ZZZ", 10),
            &registry,
            &identity_rates(),
            &AggregatorConfig::default(),
        )
        .await;

        assert_eq!(offers.len(), 1);
        assert!(offers[0].converted_price.is_none());
    }

    #[tokio::test]
    async fn test_ordering_is_deterministic_across_runs() {
        let build = || {
            registry(vec![
                StubExtractor {
                    id: "a-store",
                    country: Country::BR,
                    currency: "BRL",
                    behavior: Behavior::Offers(vec!["50.00", "10.00"]),
                },
                StubExtractor {
                    id: "b-store",
                    country: Country::BR,
                    currency: "BRL",
                    // same prices from another store: store name breaks ties
                    behavior: Behavior::Offers(vec!["10.00", "50.00"]),
                },
            ])
        };

        let run = |registry: ExtractorRegistry| async move {
            let offers = get_product_comparisons(
                &request(Country::BR, "BRL", 10),
                &registry,
                &identity_rates(),
                &AggregatorConfig::default(),
            )
            .await;
            offers
                .iter()
                .map(|o| (o.price.to_string(), o.store_name.clone()))
                .collect::<Vec<_>>()
        };

        let first = run(build()).await;
        let second = run(build()).await;
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                ("10.00".to_string(), "a-store".to_string()),
                ("10.00".to_string(), "b-store".to_string()),
                ("50.00".to_string(), "a-store".to_string()),
                ("50.00".to_string(), "b-store".to_string()),
            ]
        );
    }
}
