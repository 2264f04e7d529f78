//! eBay search extractor for the US and UK marketplaces.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "li.s-item",
    name: ".s-item__title",
    price: ".s-item__price",
    link: "a.s-item__link",
    image: "img.s-item__image-img",
    // listing condition badge ("Brand New", "Pre-Owned")
    condition: Some(".SECONDARY_INFO"),
};

#[derive(Debug, Clone, Copy)]
struct Marketplace {
    id: &'static str,
    base_url: &'static str,
    country: Country,
    currency: Currency,
    accept_language: &'static str,
    store_name: &'static str,
}

const UNITED_STATES: Marketplace = Marketplace {
    id: "ebay-us",
    base_url: "https://www.ebay.com",
    country: Country::US,
    currency: Currency::USD,
    accept_language: "en-US,en;q=0.9",
    store_name: "eBay",
};

const UNITED_KINGDOM: Marketplace = Marketplace {
    id: "ebay-uk",
    base_url: "https://www.ebay.co.uk",
    country: Country::GB,
    currency: Currency::GBP,
    accept_language: "en-GB,en;q=0.9",
    store_name: "eBay UK",
};

pub struct EbayExtractor {
    fetcher: Fetcher,
    marketplace: Marketplace,
}

impl EbayExtractor {
    pub fn united_states(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: UNITED_STATES }
    }

    pub fn united_kingdom(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: UNITED_KINGDOM }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: self.marketplace.country,
            store_name: self.marketplace.store_name,
            base_url: self.marketplace.base_url,
            currency_hint: Some(self.marketplace.currency),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/sch/i.html?_nkw={}",
            self.marketplace.base_url,
            urlencoding::encode(query)
        )
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        self.context()
            .normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for EbayExtractor {
    fn id(&self) -> &'static str {
        self.marketplace.id
    }

    fn country(&self) -> Country {
        self.marketplace.country
    }

    fn base_url(&self) -> &'static str {
        self.marketplace.base_url
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = self.marketplace.id, url = %url, "Searching");

        let profile = HeaderProfile::with_referer(
            self.marketplace.accept_language,
            self.marketplace.base_url,
        );
        let html = self.fetcher.get(&url, &profile).await?;

        Ok(self.parse(&html))
    }
}
