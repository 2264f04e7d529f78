//! Site extractors and their shared contract.
//!
//! Each module implements the `Extractor` trait for one site (or one site
//! family across marketplaces). Extractors are stateless between requests;
//! they are built once at startup and registered with the
//! `ExtractorRegistry`.

pub mod amazon;
pub mod buscape;
pub mod ebay;
pub mod idealo;
pub mod kuantokusta;
pub mod magazineluiza;
pub mod markup;
pub mod mercadolivre;
pub mod pccomponentes;
pub mod worten;
pub mod zoom;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use crate::AppError;
use crate::country::{Country, MacroRegion};
use crate::fetcher::Fetcher;
use crate::models::ProductComparison;
use crate::services::currency::{Currency, detect_currency, parse_price};
use crate::services::registry::ExtractorRegistry;
use markup::{RawOffer, RawPrice};

/// Abstraction over one scraped site.
///
/// Implementors build the search request, fetch through the shared
/// `Fetcher`, and parse responses into normalized offers.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Globally unique, stable identifier.
    fn id(&self) -> &'static str;

    /// Country every offer from this extractor belongs to.
    fn country(&self) -> Country;

    fn macro_region(&self) -> MacroRegion {
        self.country().macro_region()
    }

    fn base_url(&self) -> &'static str;

    /// Searches the site and returns normalized offers.
    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError>;
}

/// Site identity stamped onto every offer an extractor emits, plus the
/// normalization rules shared by all parse strategies.
#[derive(Debug, Clone)]
pub(crate) struct OfferContext {
    pub country: Country,
    pub store_name: &'static str,
    pub base_url: &'static str,
    /// Site-level currency default, consulted after price symbols
    pub currency_hint: Option<Currency>,
}

impl OfferContext {
    /// Normalizes one raw candidate; `None` drops it (empty name,
    /// non-positive price, or unrecognized currency).
    pub fn normalize(&self, raw: RawOffer) -> Option<ProductComparison> {
        let product_name = markup::clean_text(&raw.name);
        if product_name.is_empty() {
            return None;
        }

        let (price, symbol_currency) = match &raw.price {
            RawPrice::Text(text) => (parse_price(text).ok()?, detect_currency(text)),
            RawPrice::Value(value) => (*value, None),
        };
        if price <= Decimal::ZERO {
            return None;
        }

        // Explicit source field, then price symbol, then site, then country
        let currency = raw
            .currency
            .as_deref()
            .and_then(|code| Currency::from_str(code).ok())
            .or(symbol_currency)
            .or(self.currency_hint)
            .unwrap_or_else(|| self.country.default_currency());

        let store_url = raw
            .url
            .as_deref()
            .map(|href| markup::absolute_url(self.base_url, href));
        let image_url = raw
            .image
            .as_deref()
            .map(|href| markup::absolute_url(self.base_url, href));

        let condition = raw
            .condition
            .as_deref()
            .map(markup::clean_text)
            .filter(|c| !c.is_empty());
        let description = raw
            .description
            .as_deref()
            .map(markup::clean_text)
            .filter(|d| !d.is_empty());

        Some(ProductComparison {
            id: ProductComparison::new_id(),
            product_name,
            price,
            currency: currency.code().to_string(),
            store_name: self.store_name.to_string(),
            store_url,
            image_url,
            country: self.country,
            condition,
            description,
            converted_price: None,
            last_updated: Some(Utc::now()),
        })
    }

    pub fn normalize_all(&self, raws: Vec<RawOffer>) -> Vec<ProductComparison> {
        raws.into_iter()
            .filter_map(|raw| self.normalize(raw))
            .collect()
    }
}

/// Builds the production registry: every site extractor, base countries
/// first, in the order responses should surface them.
pub fn build_registry(fetcher: &Fetcher) -> Result<ExtractorRegistry, AppError> {
    let mut registry = ExtractorRegistry::new();

    // Brazil
    registry.register(Arc::new(buscape::BuscapeExtractor::new(fetcher.clone())))?;
    registry.register(Arc::new(zoom::ZoomExtractor::new(fetcher.clone())))?;
    registry.register(Arc::new(mercadolivre::MercadoLivreExtractor::new(fetcher.clone())))?;
    registry.register(Arc::new(magazineluiza::MagazineLuizaExtractor::new(fetcher.clone())))?;

    // Portugal
    registry.register(Arc::new(kuantokusta::KuantoKustaExtractor::new(fetcher.clone())))?;
    registry.register(Arc::new(worten::WortenExtractor::new(fetcher.clone())))?;

    // Spain
    registry.register(Arc::new(pccomponentes::PcComponentesExtractor::new(fetcher.clone())))?;
    registry.register(Arc::new(amazon::AmazonExtractor::spain(fetcher.clone())))?;
    registry.register(Arc::new(idealo::IdealoExtractor::spain(fetcher.clone())))?;

    // United States
    registry.register(Arc::new(amazon::AmazonExtractor::united_states(fetcher.clone())))?;
    registry.register(Arc::new(ebay::EbayExtractor::united_states(fetcher.clone())))?;

    // Germany
    registry.register(Arc::new(amazon::AmazonExtractor::germany(fetcher.clone())))?;
    registry.register(Arc::new(idealo::IdealoExtractor::germany(fetcher.clone())))?;

    // United Kingdom
    registry.register(Arc::new(amazon::AmazonExtractor::united_kingdom(fetcher.clone())))?;
    registry.register(Arc::new(ebay::EbayExtractor::united_kingdom(fetcher.clone())))?;
    registry.register(Arc::new(idealo::IdealoExtractor::united_kingdom(fetcher.clone())))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> OfferContext {
        OfferContext {
            country: Country::BR,
            store_name: "Zoom",
            base_url: "https://www.zoom.com.br",
            currency_hint: Some(Currency::BRL),
        }
    }

    #[test]
    fn test_normalize_text_price_with_symbol() {
        let raw = RawOffer::from_text(" iPhone  15   128GB ", "R$ 4.553,30");
        let offer = context().normalize(raw).unwrap();

        assert_eq!(offer.product_name, "iPhone 15 128GB");
        assert_eq!(offer.price, Decimal::from_str("4553.30").unwrap());
        assert_eq!(offer.currency, "BRL");
        assert_eq!(offer.store_name, "Zoom");
        assert_eq!(offer.country, Country::BR);
        assert!(offer.converted_price.is_none());
        assert!(offer.last_updated.is_some());
    }

    #[test]
    fn test_normalize_resolves_relative_urls() {
        let mut raw = RawOffer::from_text("Galaxy S24", "R$ 3.887,73");
        raw.url = Some("/p/galaxy-s24".to_string());
        raw.image = Some("//cdn.zoom.com.br/g.jpg".to_string());

        let offer = context().normalize(raw).unwrap();
        assert_eq!(
            offer.store_url.as_deref(),
            Some("https://www.zoom.com.br/p/galaxy-s24")
        );
        assert_eq!(
            offer.image_url.as_deref(),
            Some("https://cdn.zoom.com.br/g.jpg")
        );
    }

    #[test]
    fn test_normalize_currency_priority() {
        // explicit source currency beats symbol and hints
        let mut raw = RawOffer::from_text("MacBook", "$ 999.00");
        raw.currency = Some("EUR".to_string());
        assert_eq!(context().normalize(raw).unwrap().currency, "EUR");

        // symbol beats site hint
        let raw = RawOffer::from_text("MacBook", "€ 999,00");
        assert_eq!(context().normalize(raw).unwrap().currency, "EUR");

        // no signal at all falls back to the site hint, then country default
        let raw = RawOffer::from_text("MacBook", "999,00");
        assert_eq!(context().normalize(raw).unwrap().currency, "BRL");

        // unrecognized explicit currency falls through to the symbol
        let mut raw = RawOffer::from_text("MacBook", "£ 999.00");
        raw.currency = Some("XYZ".to_string());
        assert_eq!(context().normalize(raw).unwrap().currency, "GBP");
    }

    #[test]
    fn test_normalize_drops_invalid_entries() {
        assert!(context().normalize(RawOffer::from_text("   ", "R$ 10,00")).is_none());
        assert!(context().normalize(RawOffer::from_text("Nameless price", "sob consulta")).is_none());

        let mut zero = RawOffer::from_text("Zero priced", "0,00");
        assert!(context().normalize(zero.clone()).is_none());
        zero.price = RawPrice::Value(Decimal::ZERO);
        assert!(context().normalize(zero).is_none());
    }

    #[test]
    fn test_build_registry_has_every_country_covered() {
        let fetcher = Fetcher::new(crate::config::FetcherConfig::default()).unwrap();
        let registry = build_registry(&fetcher).unwrap();

        for country in Country::ALL {
            assert!(
                !registry.for_country(country).is_empty(),
                "no extractor registered for {}",
                country
            );
        }
    }
}
