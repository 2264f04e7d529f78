//! Amazon search extractor, one instance per marketplace.
//!
//! All marketplaces share the search-result card markup; only the domain,
//! locale headers, and default currency differ. Amazon gates scrapers
//! aggressively, so blocked responses are a normal outcome here.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div[data-component-type='s-search-result']",
    name: "h2 a span",
    price: "span.a-price span.a-offscreen",
    link: "h2 a",
    image: "img.s-image",
    condition: None,
};

/// Static description of one Amazon storefront.
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
    id: "amazon-us",
    base_url: "https://www.amazon.com",
    country: Country::US,
    currency: Currency::USD,
    accept_language: "en-US,en;q=0.9",
    store_name: "Amazon",
};

const SPAIN: Marketplace = Marketplace {
    id: "amazon-es",
    base_url: "https://www.amazon.es",
    country: Country::ES,
    currency: Currency::EUR,
    accept_language: "es-ES,es;q=0.9,en;q=0.5",
    store_name: "Amazon ES",
};

const GERMANY: Marketplace = Marketplace {
    id: "amazon-de",
    base_url: "https://www.amazon.de",
    country: Country::DE,
    currency: Currency::EUR,
    accept_language: "de-DE,de;q=0.9,en;q=0.5",
    store_name: "Amazon DE",
};

const UNITED_KINGDOM: Marketplace = Marketplace {
    id: "amazon-uk",
    base_url: "https://www.amazon.co.uk",
    country: Country::GB,
    currency: Currency::GBP,
    accept_language: "en-GB,en;q=0.9",
    store_name: "Amazon UK",
};

pub struct AmazonExtractor {
    fetcher: Fetcher,
    marketplace: Marketplace,
}

impl AmazonExtractor {
    pub fn united_states(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: UNITED_STATES }
    }

    pub fn spain(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: SPAIN }
    }

    pub fn germany(fetcher: Fetcher) -> Self {
        Self { fetcher, marketplace: GERMANY }
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
            "{}/s?k={}",
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
impl Extractor for AmazonExtractor {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn fetcher() -> Fetcher {
        Fetcher::new(FetcherConfig::default()).unwrap()
    }

    const RESULT_PAGE: &str = r#"
      <div data-component-type="s-search-result">
        <h2><a href="/dp/B0CHX1W1XY"><span>iPhone 15 128 GB</span></a></h2>
        <span class="a-price"><span class="a-offscreen">879,00&nbsp;€</span></span>
        <img class="s-image" src="https://m.media-amazon.com/images/iphone.jpg">
      </div>
      <div data-component-type="s-search-result">
        <h2><a href="/dp/B0CHX2ABCD"><span>Funda iPhone 15</span></a></h2>
        <span class="a-price"><span class="a-offscreen">15,99&nbsp;€</span></span>
      </div>
    "#;

    #[test]
    fn test_marketplaces_have_distinct_ids_and_countries() {
        let us = AmazonExtractor::united_states(fetcher());
        let es = AmazonExtractor::spain(fetcher());
        let de = AmazonExtractor::germany(fetcher());
        let uk = AmazonExtractor::united_kingdom(fetcher());

        assert_eq!(us.id(), "amazon-us");
        assert_eq!(us.country(), Country::US);
        assert_eq!(es.country(), Country::ES);
        assert_eq!(de.country(), Country::DE);
        assert_eq!(uk.country(), Country::GB);
        assert_eq!(uk.base_url(), "https://www.amazon.co.uk");
    }

    #[test]
    fn test_parse_spanish_result_page() {
        let offers = AmazonExtractor::spain(fetcher()).parse(RESULT_PAGE);
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].product_name, "iPhone 15 128 GB");
        assert_eq!(offers[0].price, Decimal::from_str("879.00").unwrap());
        assert_eq!(offers[0].currency, "EUR");
        assert_eq!(offers[0].country, Country::ES);
        assert_eq!(
            offers[0].store_url.as_deref(),
            Some("https://www.amazon.es/dp/B0CHX1W1XY")
        );
    }

    #[test]
    fn test_search_url_per_marketplace() {
        assert_eq!(
            AmazonExtractor::germany(fetcher()).search_url("usb c kabel"),
            "https://www.amazon.de/s?k=usb%20c%20kabel"
        );
    }
}
