//! Zoom (zoom.com.br) search extractor. Same storefront platform as
//! Buscapé, so the parse pipeline mirrors it.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.zoom.com.br";

const EMBEDDED_PATH: [&str; 4] = ["props", "pageProps", "basePage", "data"];

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div[data-testid='product-card']",
    name: "h2[data-testid='product-card::name']",
    price: "p[data-testid='product-card::price']",
    link: "a[data-testid='product-card::card']",
    image: "img[data-testid='product-card::image']",
    condition: None,
};

pub struct ZoomExtractor {
    fetcher: Fetcher,
}

impl ZoomExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::BR,
            store_name: "Zoom",
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

        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }
        tracing::debug!(site = "zoom", "Structured strategies missed, trying DOM");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for ZoomExtractor {
    fn id(&self) -> &'static str {
        "zoom"
    }

    fn country(&self) -> Country {
        Country::BR
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = "zoom", url = %url, "Searching");

        let profile = HeaderProfile::with_referer("pt-BR,pt;q=0.9,en;q=0.5", BASE_URL);
        let html = self.fetcher.get(&url, &profile).await?;

        Ok(self.parse(&html))
    }
}
