//! PcComponentes (pccomponentes.com) search extractor.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.pccomponentes.com";

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div[data-testid='normal-link-product']",
    name: "h3[data-testid='title']",
    price: "span[data-testid='price']",
    link: "a[data-testid='product-link']",
    image: "img[data-testid='product-image']",
    condition: None,
};

pub struct PcComponentesExtractor {
    fetcher: Fetcher,
}

impl PcComponentesExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::ES,
            store_name: "PcComponentes",
            base_url: BASE_URL,
            currency_hint: Some(Currency::EUR),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/buscar/?query={}", BASE_URL, urlencoding::encode(query))
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }
        tracing::debug!(site = "pccomponentes", "JSON-LD miss, trying DOM selectors");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for PcComponentesExtractor {
    fn id(&self) -> &'static str {
        "pccomponentes"
    }

    fn country(&self) -> Country {
        Country::ES
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = "pccomponentes", url = %url, "Searching");

        let profile = HeaderProfile::with_referer("es-ES,es;q=0.9,en;q=0.5", BASE_URL);
        let html = self.fetcher.get(&url, &profile).await?;

        Ok(self.parse(&html))
    }
}
