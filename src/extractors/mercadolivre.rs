//! Mercado Livre (mercadolivre.com.br) search extractor.
//!
//! Search URLs are path-style (`/iphone-15`). Listings embed JSON-LD for
//! the visible results; the DOM card layout is the fallback.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.mercadolivre.com.br";
const SEARCH_URL: &str = "https://lista.mercadolivre.com.br";

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "li.ui-search-layout__item",
    name: "h2.ui-search-item__title",
    // whole-unit part of the split price markup; cents render separately
    price: "span.andes-money-amount__fraction",
    link: "a.ui-search-link",
    image: "img.ui-search-result-image__element",
    condition: None,
};

pub struct MercadoLivreExtractor {
    fetcher: Fetcher,
}

impl MercadoLivreExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::BR,
            store_name: "Mercado Livre",
            base_url: BASE_URL,
            currency_hint: Some(Currency::BRL),
        }
    }

    /// Path-style search: spaces become hyphens in the path segment.
    fn search_url(&self, query: &str) -> String {
        let slug = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        format!("{}/{}", SEARCH_URL, urlencoding::encode(&slug))
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }
        tracing::debug!(site = "mercadolivre", "JSON-LD miss, trying DOM selectors");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for MercadoLivreExtractor {
    fn id(&self) -> &'static str {
        "mercadolivre"
    }

    fn country(&self) -> Country {
        Country::BR
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = "mercadolivre", url = %url, "Searching");

        let profile = HeaderProfile::with_referer("pt-BR,pt;q=0.9", BASE_URL);
        let html = self.fetcher.get(&url, &profile).await?;

        Ok(self.parse(&html))
    }
}
