//! Shared parsing helpers for site extractors.
//!
//! Three parse strategies operate on fetched documents: embedded Next.js
//! state (`__NEXT_DATA__`), JSON-LD product blocks, and CSS-selector DOM
//! extraction. All of them emit `RawOffer`s; normalization into the final
//! record happens in one place (`OfferContext`).

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use scraper::{Html, Selector};
use serde_json::Value;

/// A product candidate before normalization. Field values are carried as
/// found; cleaning, price parsing, and URL resolution happen later.
#[derive(Debug, Clone)]
pub struct RawOffer {
    pub name: String,
    pub price: RawPrice,
    /// Explicit currency code when the source states one (JSON-LD, APIs)
    pub currency: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub condition: Option<String>,
    pub description: Option<String>,
}

/// Price as found in the source: marked-up text or an already-numeric value.
#[derive(Debug, Clone)]
pub enum RawPrice {
    Text(String),
    Value(Decimal),
}

impl RawOffer {
    pub fn from_text(name: &str, price_text: &str) -> Self {
        Self {
            name: name.to_string(),
            price: RawPrice::Text(price_text.to_string()),
            currency: None,
            url: None,
            image: None,
            condition: None,
            description: None,
        }
    }
}

/// CSS selectors describing one site's product cards.
#[derive(Debug, Clone)]
pub struct ProductSelectors {
    pub container: &'static str,
    pub name: &'static str,
    pub price: &'static str,
    pub link: &'static str,
    pub image: &'static str,
    pub condition: Option<&'static str>,
}

/// Collapses internal whitespace runs and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes the HTML entities that survive into scraped text and embedded
/// JSON strings. Unknown entities are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        // entities are short; a distant semicolon means a bare ampersand
        let Some(end) = rest.find(';').filter(|&e| e <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };

        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Entity-decodes then whitespace-normalizes a scraped string.
pub fn clean_text(text: &str) -> String {
    collapse_whitespace(&decode_entities(text))
}

/// Resolves a possibly-relative href against a site base URL.
pub fn absolute_url(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(protocol_relative) = href.strip_prefix("//") {
        return format!("https://{}", protocol_relative);
    }

    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

/// Extracts product cards from a search results page via CSS selectors.
///
/// Cards missing a name or price are skipped; an unparsable selector set
/// yields an empty list rather than an error.
pub fn dom_offers(html: &str, selectors: &ProductSelectors) -> Vec<RawOffer> {
    let (Ok(container), Ok(name), Ok(price), Ok(link), Ok(image)) = (
        Selector::parse(selectors.container),
        Selector::parse(selectors.name),
        Selector::parse(selectors.price),
        Selector::parse(selectors.link),
        Selector::parse(selectors.image),
    ) else {
        tracing::debug!(container = selectors.container, "Invalid selector set");
        return Vec::new();
    };
    let condition = selectors
        .condition
        .and_then(|sel| Selector::parse(sel).ok());

    let document = Html::parse_document(html);
    let mut offers = Vec::new();

    for card in document.select(&container) {
        let Some(name_text) = card
            .select(&name)
            .next()
            .map(|el| el.text().collect::<String>())
        else {
            continue;
        };

        let Some(price_text) = card
            .select(&price)
            .next()
            .map(|el| el.text().collect::<String>())
        else {
            continue;
        };

        let url = card
            .select(&link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| href.to_string());

        // data-src first for lazy-loaded images, then src
        let image = card.select(&image).next().and_then(|el| {
            el.value()
                .attr("data-src")
                .filter(|src| !src.is_empty() && !src.contains("data:image"))
                .or_else(|| el.value().attr("src"))
                .map(|src| src.to_string())
        });

        let condition = condition.as_ref().and_then(|sel| {
            card.select(sel)
                .next()
                .map(|el| el.text().collect::<String>())
        });

        offers.push(RawOffer {
            name: name_text,
            price: RawPrice::Text(price_text),
            currency: None,
            url,
            image,
            condition,
            description: None,
        });
    }

    offers
}

/// Parses every `<script type="application/ld+json">` block, skipping the
/// ones that are not valid JSON.
fn json_ld_blocks(html: &str) -> Vec<Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| {
            let raw = el.text().collect::<String>();
            serde_json::from_str::<Value>(raw.trim()).ok()
        })
        .collect()
}

/// Extracts offers from JSON-LD `Product` entries.
///
/// Handles top-level objects and arrays, `@graph` containers, and
/// `ItemList.itemListElement[].item` wrappers.
pub fn json_ld_offers(html: &str) -> Vec<RawOffer> {
    let mut offers = Vec::new();

    for block in json_ld_blocks(html) {
        collect_ld_products(&block, &mut offers);
    }

    offers
}

fn collect_ld_products(node: &Value, out: &mut Vec<RawOffer>) {
    match node {
        Value::Array(items) => {
            for item in items {
                collect_ld_products(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_ld_products(graph, out);
            }
            if let Some(elements) = map.get("itemListElement") {
                collect_ld_products(elements, out);
            }
            if let Some(item) = map.get("item") {
                collect_ld_products(item, out);
            }
            if is_ld_type(map.get("@type"), "Product") {
                if let Some(offer) = ld_product_offer(node) {
                    out.push(offer);
                }
            }
        }
        _ => {}
    }
}

fn is_ld_type(type_field: Option<&Value>, wanted: &str) -> bool {
    match type_field {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(wanted)),
        _ => false,
    }
}

fn ld_product_offer(product: &Value) -> Option<RawOffer> {
    let name = product.get("name")?.as_str()?.to_string();

    // "offers" may be one offer object or an array of seller offers
    let offers_node = product.get("offers")?;
    let first_offer = match offers_node {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let price = ld_price(first_offer)?;
    let currency = first_offer
        .get("priceCurrency")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let url = first_offer
        .get("url")
        .or_else(|| product.get("url"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let image = match product.get("image") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(|v| v.as_str()).map(|s| s.to_string()),
        Some(Value::Object(map)) => map.get("url").and_then(|v| v.as_str()).map(|s| s.to_string()),
        _ => None,
    };

    let condition = first_offer
        .get("itemCondition")
        .and_then(|v| v.as_str())
        .and_then(ld_condition_label)
        .map(|s| s.to_string());

    let description = product
        .get("description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Some(RawOffer {
        name,
        price,
        currency,
        url,
        image,
        condition,
        description,
    })
}

fn ld_price(offer: &Value) -> Option<RawPrice> {
    let field = offer.get("price").or_else(|| offer.get("lowPrice"))?;
    match field {
        Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64)
            .map(RawPrice::Value),
        Value::String(s) => Some(RawPrice::Text(s.clone())),
        _ => None,
    }
}

/// Maps schema.org condition URLs/names onto the short labels offers carry.
fn ld_condition_label(raw: &str) -> Option<&'static str> {
    let tail = raw.rsplit('/').next().unwrap_or(raw);
    match tail {
        "NewCondition" => Some("new"),
        "UsedCondition" => Some("used"),
        "RefurbishedCondition" => Some("refurbished"),
        "DamagedCondition" => Some("damaged"),
        _ => None,
    }
}

/// Parses the Next.js `__NEXT_DATA__` script payload.
pub fn next_data(html: &str) -> Option<Value> {
    let selector = Selector::parse("script#__NEXT_DATA__").ok()?;
    let document = Html::parse_document(html);
    let raw = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())?;
    serde_json::from_str(raw.trim()).ok()
}

/// Walks a JSON object along a key path.
pub fn json_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut node = value;
    for key in path {
        node = node.get(key)?;
    }
    Some(node)
}

/// Reads a product list from an embedded Next.js payload at a known path.
///
/// Any structural mismatch is a parse miss (`None`), never an error; the
/// exact nesting shifts when sites redeploy.
pub fn next_data_offers(html: &str, path: &[&str]) -> Option<Vec<RawOffer>> {
    let data = next_data(html)?;
    let items = json_at(&data, path)?.as_array()?;

    let offers = items.iter().filter_map(embedded_product_offer).collect::<Vec<_>>();
    if offers.is_empty() { None } else { Some(offers) }
}

/// Reads one product object from an embedded payload or JSON search API.
pub fn embedded_product_offer(item: &Value) -> Option<RawOffer> {
    let name = item
        .get("name")
        .or_else(|| item.get("title"))
        .and_then(|v| v.as_str())?
        .to_string();

    let price = embedded_price(item)?;

    let currency = item
        .get("currency")
        .or_else(|| item.get("priceCurrency"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let url = item
        .get("url")
        .or_else(|| item.get("link"))
        .or_else(|| item.get("path"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let image = item
        .get("image")
        .or_else(|| item.get("imageUrl"))
        .or_else(|| item.get("thumbnail"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let description = item
        .get("description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Some(RawOffer {
        name,
        price,
        currency,
        url,
        image,
        condition: None,
        description,
    })
}

fn embedded_price(item: &Value) -> Option<RawPrice> {
    let field = item.get("price")?;
    match field {
        Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64)
            .map(RawPrice::Value),
        Value::String(s) => Some(RawPrice::Text(s.clone())),
        // nested shapes like {"price": {"value": 4553.3}}
        Value::Object(map) => {
            let inner = map
                .get("value")
                .or_else(|| map.get("price"))
                .or_else(|| map.get("amount"))?;
            match inner {
                Value::Number(n) => n
                    .as_f64()
                    .and_then(Decimal::from_f64)
                    .map(RawPrice::Value),
                Value::String(s) => Some(RawPrice::Text(s.clone())),
                _ => None,
            }
        }
        _ => None,
    }
}
