use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::country::Country;

/// One normalized product offer from one source.
///
/// Extractors emit these; the aggregator attaches `converted_price` when the
/// offer currency differs from the requested target and a rate is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductComparison {
    /// Opaque unique identifier, generated at extraction time
    pub id: String,
    /// Trimmed, whitespace-normalized product title
    pub product_name: String,
    /// Positive price in the offer's native currency
    pub price: Decimal,
    /// ISO 4217 code of `price`
    pub currency: String,
    /// Human-readable seller/marketplace label
    pub store_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Country of the producing extractor
    pub country: Country,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_price: Option<ConvertedPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Price expressed in the requested target currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedPrice {
    pub price: Decimal,
    pub currency: String,
}

impl ProductComparison {
    /// Generates a fresh offer id.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Price used for sorting: the converted price when present, the native
    /// price otherwise.
    pub fn effective_price(&self) -> Decimal {
        self.converted_price
            .as_ref()
            .map(|c| c.price)
            .unwrap_or(self.price)
    }
}

/// Response envelope for the comparison search endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    pub success: bool,
    pub total_results: usize,
    pub comparisons: Vec<ProductComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComparisonResponse {
    /// Successful envelope around a list of offers.
    pub fn ok(comparisons: Vec<ProductComparison>) -> Self {
        let message = if comparisons.is_empty() {
            Some("No offers found for this query".to_string())
        } else {
            None
        };

        Self {
            success: true,
            total_results: comparisons.len(),
            comparisons,
            message,
        }
    }

    /// Failure envelope carrying only a diagnostic message.
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            total_results: 0,
            comparisons: Vec::new(),
            message: Some(message),
        }
    }
}
