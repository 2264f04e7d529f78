//! KuantoKusta (kuantokusta.pt) search extractor.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.kuantokusta.pt";

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div[data-testid='product-card']",
    name: "h3[data-testid='product-card-name']",
    price: "span[data-testid='product-card-price']",
    link: "a[data-testid='product-card-link']",
    image: "img[data-testid='product-card-image']",
    condition: None,
};

pub struct KuantoKustaExtractor {
    fetcher: Fetcher,
}

impl KuantoKustaExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::PT,
            store_name: "KuantoKusta",
            base_url: BASE_URL,
            currency_hint: Some(Currency::EUR),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search?q={}", BASE_URL, urlencoding::encode(query))
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }
        tracing::debug!(site = "kuantokusta", "JSON-LD miss, trying DOM selectors");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for KuantoKustaExtractor {
    fn id(&self) -> &'static str {
        "kuantokusta"
    }

    fn country(&self) -> Country {
        Country::PT
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = "kuantokusta", url = %url, "Searching");

        let profile = HeaderProfile::with_referer("pt-PT,pt;q=0.9,en;q=0.5", BASE_URL);
        let html = self.fetcher.get(&url, &profile).await?;

        Ok(self.parse(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_parse_json_ld_with_euro_prices() {
        let html = r#"
          <script type="application/ld+json">
          {"@graph":[
            {"@type":"Product","name":"MacBook Air M3 13","image":"https://cdn.kk.pt/m.jpg",
             "offers":{"@type":"AggregateOffer","lowPrice":"1.099,00","priceCurrency":"EUR",
                       "url":"/p/macbook-air-m3"}}
          ]}
          </script>
        "#;

        let extractor =
            KuantoKustaExtractor::new(Fetcher::new(FetcherConfig::default()).unwrap());
        let offers = extractor.parse(html);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].price, Decimal::from_str("1099.00").unwrap());
        assert_eq!(offers[0].currency, "EUR");
        assert_eq!(offers[0].country, Country::PT);
        assert_eq!(
            offers[0].store_url.as_deref(),
            Some("https://www.kuantokusta.pt/p/macbook-air-m3")
        );
    }

    #[test]
    fn test_parse_dom_fallback() {
        let html = r#"
          <div data-testid="product-card">
            <h3 data-testid="product-card-name">AirPods Pro 2</h3>
            <span data-testid="product-card-price">249,99 €</span>
            <a data-testid="product-card-link" href="/p/airpods-pro-2">ver</a>
          </div>
        "#;

        let extractor =
            KuantoKustaExtractor::new(Fetcher::new(FetcherConfig::default()).unwrap());
        let offers = extractor.parse(html);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].price, Decimal::from_str("249.99").unwrap());
        assert_eq!(offers[0].currency, "EUR");
    }
}
