//! API route handlers.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AggregatorConfig;
use crate::country::Country;
use crate::models::ComparisonResponse;
use crate::services::{self, ComparisonRequest};
use crate::{AppError, AppState, observability};

/// Query parameters for the comparison search endpoint.
///
/// Everything arrives as an optional string so validation failures map to
/// the API's own diagnostics instead of the framework's.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub name: Option<String>,
    pub base_country: Option<String>,
    pub current_user_country: Option<String>,
    pub currency: Option<String>,
    pub limit: Option<String>,
    pub use_macro_region: Option<String>,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Initializes the Prometheus metrics exporter.
pub fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full("comparison_duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0],
        )
        .unwrap()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Creates the main application router with all routes.
pub fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/metrics",
            get(move || metrics_handler(metrics_handle.clone())),
        )
        .route("/api/v1/comparisons/search", get(search_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint.
async fn metrics_handler(handle: PrometheusHandle) -> Response {
    handle.render().into_response()
}

/// Maps a caught handler panic to the generic 500 envelope.
pub fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");
    AppError::Internal(detail).into_response()
}

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Comparison search endpoint.
///
/// Fans the query out to the selected extractors and returns the merged,
/// per-country sorted offer list. Extractor failures degrade to partial
/// results; only invalid input fails the request.
///
/// # Query Parameters
/// * `name` - Product search query (required)
/// * `baseCountry` - ISO country the user shops from (required)
/// * `currentUserCountry` - ISO country the user is currently in (optional)
/// * `currency` - Target currency for conversion (optional, defaults to the
///   base country's currency)
/// * `limit` - Max offers per country (optional, default 10)
/// * `useMacroRegion` - Expand the current country to its macro-region
///   (optional, default false)
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<ComparisonResponse>, AppError> {
    let request = parse_request(params, &state.config.aggregator)?;

    tracing::info!(
        query = %request.query,
        base = %request.base,
        current = ?request.current,
        currency = %request.target_currency,
        "Received comparison request"
    );

    let _tracker = observability::metrics::ComparisonTracker::new();
    let started = Instant::now();
    let offers = services::get_product_comparisons(
        &request,
        &state.registry,
        &state.rates,
        &state.config.aggregator,
    )
    .await;

    observability::record_comparison(offers.len(), started.elapsed());
    tracing::info!(
        query = %request.query,
        results = offers.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Comparison completed"
    );

    Ok(Json(ComparisonResponse::ok(offers)))
}

/// Validates raw query parameters into a `ComparisonRequest`.
fn parse_request(
    params: SearchQuery,
    defaults: &AggregatorConfig,
) -> Result<ComparisonRequest, AppError> {
    let query = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Validation("Query parameter 'name' is required".to_string()))?
        .to_string();

    let base = params
        .base_country
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            AppError::Validation("Query parameter 'baseCountry' is required".to_string())
        })?
        .parse::<Country>()?;

    let current = params
        .current_user_country
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(Country::from_str)
        .transpose()?;

    // Unknown currency codes are accepted; they just never find a rate
    let target_currency = params
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| base.default_currency().code().to_string());

    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => defaults.default_limit,
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Query parameter 'limit' must be a positive integer, got '{}'",
                    raw
                ))
            })?,
    };

    let use_macro_region = match params.use_macro_region.as_deref().map(str::trim) {
        None | Some("") => false,
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(AppError::Validation(format!(
                    "Query parameter 'useMacroRegion' must be 'true' or 'false', got '{}'",
                    other
                )));
            }
        },
    };

    Ok(ComparisonRequest {
        query,
        base,
        current,
        target_currency,
        use_macro_region,
        limit,
    })
}
