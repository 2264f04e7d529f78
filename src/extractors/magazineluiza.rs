//! Magazine Luiza (magazineluiza.com.br) search extractor.

use async_trait::async_trait;

use super::{Extractor, OfferContext, markup};
use crate::AppError;
use crate::country::Country;
use crate::fetcher::{Fetcher, HeaderProfile};
use crate::models::ProductComparison;
use crate::services::currency::Currency;

const BASE_URL: &str = "https://www.magazineluiza.com.br";

/// Search results sit under the page data of the Next.js payload.
const EMBEDDED_PATH: [&str; 5] = ["props", "pageProps", "data", "search", "products"];

const SELECTORS: markup::ProductSelectors = markup::ProductSelectors {
    container: "div[data-testid='product-card-container']",
    name: "h2[data-testid='product-title']",
    price: "p[data-testid='price-value']",
    link: "a[data-testid='product-card-container']",
    image: "img[data-testid='image']",
    condition: None,
};

pub struct MagazineLuizaExtractor {
    fetcher: Fetcher,
}

impl MagazineLuizaExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    fn context(&self) -> OfferContext {
        OfferContext {
            country: Country::BR,
            store_name: "Magazine Luiza",
            base_url: BASE_URL,
            currency_hint: Some(Currency::BRL),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/busca/{}/", BASE_URL, urlencoding::encode(query.trim()))
    }

    fn parse(&self, html: &str) -> Vec<ProductComparison> {
        let context = self.context();

        if let Some(raws) = markup::next_data_offers(html, &EMBEDDED_PATH) {
            let offers = context.normalize_all(raws);
            if !offers.is_empty() {
                return offers;
            }
        }
        tracing::debug!(site = "magazineluiza", "Embedded state miss, trying DOM selectors");

        context.normalize_all(markup::dom_offers(html, &SELECTORS))
    }
}

#[async_trait]
impl Extractor for MagazineLuizaExtractor {
    fn id(&self) -> &'static str {
        "magazineluiza"
    }

    fn country(&self) -> Country {
        Country::BR
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    async fn get_comparisons(&self, query: &str) -> Result<Vec<ProductComparison>, AppError> {
        let url = self.search_url(query);
        tracing::debug!(site = "magazineluiza", url = %url, "Searching");

        let profile = HeaderProfile::with_referer("pt-BR,pt;q=0.9", BASE_URL);
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
    fn test_parse_embedded_products() {
        let html = r#"
          <script id="__NEXT_DATA__" type="application/json">
          {"props":{"pageProps":{"data":{"search":{"products":[
            {"title":"Smart TV 50","price":{"price":"2.399,00"},
             "path":"/smart-tv-50/p/123/","image":"https://a-static.mlcdn.com.br/tv.jpg"}
          ]}}}}}
          </script>
        "#;

        let extractor =
            MagazineLuizaExtractor::new(Fetcher::new(FetcherConfig::default()).unwrap());
        let offers = extractor.parse(html);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].product_name, "Smart TV 50");
        assert_eq!(offers[0].price, Decimal::from_str("2399.00").unwrap());
        assert_eq!(
            offers[0].store_url.as_deref(),
            Some("https://www.magazineluiza.com.br/smart-tv-50/p/123/")
        );
    }
}
