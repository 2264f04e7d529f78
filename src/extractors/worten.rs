//! Worten (worten.pt) search extractor.
//!
//! Worten exposes a JSON text-search endpoint; the POST API is the primary
//! strategy, with the rendered search page (JSON-LD, then DOM) taken only
//! when the API yields nothing usable.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.worten.pt";
const API_URL: &str = "https://www.worten.pt/_/api/text-search";

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div.product-card",
    name: ".product-card__name",
    price: ".product-card__price",
    link: "a.product-card__link",
    image: "img.product-card__image",
    condition: None,
};

pub struct WortenExtractor {
    fetcher: Fetcher,
}

impl WortenExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::PT,
            store_name: "Worten",
            base_url: BASE_URL,
            currency_hint: Some(Currency::EUR),
        }
    }

    fn profile(&self) -> HeaderProfile {
        HeaderProfile::with_referer("pt-PT,pt;q=0.9,en;q=0.5", BASE_URL)
    }

    fn api_body(query: &str) -> Value {
        json!({ "query": query, "page": 1 })
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search?query={}", BASE_URL, urlencoding::encode(query))
    }

    /// Product list from the text-search API payload.
    fn parse_api(&self, body: &str) -> Vec<ProductComparison> {
        let Ok(payload) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };

        let products = payload
            .get("products")
            .or_else(|| markup::json_at(&payload, &["data", "products"]))
            .and_then(|v| v.as_array());

        let Some(items) = products else {
            tracing::debug!(site = "worten", "API payload shape mismatch");
            return Vec::new();
        };

        let raws = items
            .iter()
            .filter_map(markup::embedded_product_offer)
            .collect();
        self.context().normalize_all(raws)
    }

    fn parse_page(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }
        tracing::debug!(site = "worten", "JSON-LD miss, trying DOM selectors");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for WortenExtractor {
    fn id(&self) -> &'static str {
        "worten"
    }

    fn country(&self) -> Country {
        Country::PT
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        tracing::debug!(site = "worten", query = %query, "Searching via text-search API");

        match self
            .fetcher
            .post_json(API_URL, &Self::api_body(query), &self.profile())
            .await
        {
            Ok(body) => {
                let offers = self.parse_api(&body);
                if !offers.is_empty() {
                    return Ok(offers);
                }
                tracing::debug!(site = "worten", "API returned no offers, trying search page");
            }
            // the rendered page is still worth a try on API failures
            Err(e) => {
                tracing::debug!(site = "worten", error = %e, "Text-search API failed");
            }
        }

        let url = self.search_url(query);
        let html = self.fetcher.get(&url, &self.profile()).await?;
        Ok(self.parse_page(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn extractor() -> WortenExtractor {
        WortenExtractor::new(Fetcher::new(FetcherConfig::default()).unwrap())
    }

    #[test]
    fn test_parse_api_products() {
        let body = r#"{"products":[
          {"name":"iPhone 15 128GB","price":{"value":879.99},"url":"/produtos/iphone-15",
           "image":"https://img.worten.pt/i.jpg"},
          {"name":"Capa iPhone","price":"19,99"}
        ]}"#;

        let offers = extractor().parse_api(body);
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].price, Decimal::from_str("879.99").unwrap());
        assert_eq!(offers[0].currency, "EUR");
        assert_eq!(
            offers[0].store_url.as_deref(),
            Some("https://www.worten.pt/produtos/iphone-15")
        );
        assert_eq!(offers[1].price, Decimal::from_str("19.99").unwrap());
    }

    #[test]
    fn test_parse_api_shape_mismatch_is_empty() {
        assert!(extractor().parse_api(r#"{"hits":[{"name":"x"}]}"#).is_empty());
        assert!(extractor().parse_api("not json").is_empty());
    }

    #[test]
    fn test_parse_page_dom() {
        let html = r#"
          <div class="product-card">
            <span class="product-card__name">Máquina de Café</span>
            <span class="product-card__price">59,99 €</span>
            <a class="product-card__link" href="/produtos/cafe-123">ver</a>
          </div>
        "#;

        let offers = extractor().parse_page(html);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].product_name, "Máquina de Café");
        assert_eq!(offers[0].price, Decimal::from_str("59.99").unwrap());
    }
}
