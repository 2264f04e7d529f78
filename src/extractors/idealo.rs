//! Idealo price-comparison extractor (idealo.de, idealo.es, idealo.co.uk).

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div.sr-resultList__item",
    name: ".sr-productSummary__title",
    price: ".sr-detailedPriceInfo__price",
    link: "a.sr-resultItemLink",
    image: "img.sr-resultItemTile__image",
    condition: None,
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

const GERMANY: Marketplace = Marketplace {
    id: "idealo-de",
    base_url: "https://www.idealo.de",
    country: Country::DE,
    currency: Currency::EUR,
    accept_language: "de-DE,de;q=0.9,en;q=0.5",
    store_name: "Idealo",
};

const SPAIN: Marketplace = Marketplace {
    id: "idealo-es",
    base_url: "https://www.idealo.es",
    country: Country::ES,
    currency: Currency::EUR,
    accept_language: "es-ES,es;q=0.9,en;q=0.5",
    store_name: "Idealo ES",
};

const UNITED_KINGDOM: Marketplace = Marketplace {
    id: "idealo-uk",
    base_url: "https://www.idealo.co.uk",
    country: Country::GB,
    currency: Currency::GBP,
    accept_language: "en-GB,en;q=0.9",
    store_name: "Idealo UK",
};

pub struct IdealoExtractor {
    fetcher: Fetcher,
    marketplace: Marketplace,
}

impl IdealoExtractor {
    pub fn germany(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: GERMANY }
    }

    pub fn spain(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: SPAIN }
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
            "{}/preisvergleich/MainSearchProductCategory.html?q={}",
            self.marketplace.base_url,
            urlencoding::encode(query)
        )
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        // result pages carry JSON-LD on some categories
        let offers = context.normalize_all(markup::json_ld_offers(html));
        if !offers.is_empty() {
            return offers;
        }

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for IdealoExtractor {
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
