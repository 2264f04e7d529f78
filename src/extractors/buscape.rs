//! Buscapé (buscape.com.br) search extractor.
//!
//! The search page is a Next.js app; the primary strategy reads the
//! `__NEXT_DATA__` payload. JSON-LD and the product-card DOM cover
//! deployments where the embedded state moves.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.buscape.com.br";

/// Known location of the search result list inside `__NEXT_DATA__`.
const EMBEDDED_PATH: [&str; 4] = ["props", "pageProps", "basePage", "data"];

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div[data-testid='product-card']",
    name: "h2[data-testid='product-card::name']",
    price: "p[data-testid='product-card::price']",
    link: "a[data-testid='product-card::card']",
    image: "img[data-testid='product-card::image']",
    condition: None,
};

pub struct BuscapeExtractor {
    fetcher: Fetcher,
}

impl BuscapeExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::BR,
            store_name: "Buscapé",
            base_url: BASE_URL,
            currency_hint: Some(Currency::BRL),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search?q={}", BASE_URL, urlencoding::encode(query))
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        if let Some(raws) = markup::next_data_offers(html, &EMBEDDED_PATH) {
            let offers = context.normalize_all(raws);
            if !offers.is_empty() {
                return offers;
            }
        }
        tracing::debug!(site = "buscape", "Embedded state miss, trying JSON-LD");

        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }
        tracing::debug!(site = "buscape", "JSON-LD miss, trying DOM selectors");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for BuscapeExtractor {
    fn id(&self) -> &'static str {
        "buscape"
    }

    fn country(&self) -> Country {
        Country::BR
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = "buscape", url = %url, "Searching");

        let profile = HeaderProfile::with_referer("pt-BR,pt;q=0.9,en;q=0.5", BASE_URL);
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

    fn extractor() -> BuscapeExtractor {
        BuscapeExtractor::new(Fetcher::new(FetcherConfig::default()).unwrap())
    }

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            extractor().search_url("iphone 15 pro"),
            "https://www.buscape.com.br/search?q=iphone%2015%20pro"
        );
    }

    #[test]
    fn test_parse_embedded_state() {
        let html = r#"
          <script id="__NEXT_DATA__" type="application/json">
          {"props":{"pageProps":{"basePage":{"data":[
            {"name":"iPhone 15 128GB","price":{"value":4553.3},"url":"/iphone-15/p"},
            {"name":"iPhone 15 256GB","price":"R$ 5.108,90","url":"/iphone-15-256/p"}
          ]}}}}
          </script>
        "#;

        let offers = extractor().parse(html);
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].price, Decimal::from_str("4553.3").unwrap());
        assert_eq!(offers[0].currency, "BRL");
        assert_eq!(offers[0].country, Country::BR);
        assert_eq!(
            offers[0].store_url.as_deref(),
            Some("https://www.buscape.com.br/iphone-15/p")
        );
        assert_eq!(offers[1].price, Decimal::from_str("5108.90").unwrap());
    }

    #[test]
    fn test_parse_falls_back_to_dom() {
        let html = r#"
          <script id="__NEXT_DATA__" type="application/json">{"props":{}}</script>
          <div data-testid="product-card">
            <h2 data-testid="product-card::name">Galaxy S24</h2>
            <p data-testid="product-card::price">R$ 3.887,73</p>
            <a data-testid="product-card::card" href="/galaxy-s24/p">ver</a>
          </div>
        "#;

        let offers = extractor().parse(html);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].product_name, "Galaxy S24");
        assert_eq!(offers[0].price, Decimal::from_str("3887.73").unwrap());
    }

    #[test]
    fn test_parse_empty_page_yields_no_offers() {
        assert!(extractor().parse("<html><body></body></html>").is_empty());
    }
}
