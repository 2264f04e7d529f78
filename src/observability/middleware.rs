//! Axum middleware for automatic metrics collection.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use super::metrics;

/// Label used when a request never matched a route.
const UNMATCHED: &str = "unmatched";

/// Records count, duration, and error metrics for every request.
///
/// The path label is the matched route template (`/api/v1/...`), not the
/// raw URI, so junk request paths cannot explode label cardinality.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = route_label(&req);
    let started = Instant::now();

    let response = next.run(req).await;

    metrics::record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed(),
    );

    response
}

fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_route_label_falls_back_for_unmatched_requests() {
        let req = Request::builder()
            .uri("/no/such/route?x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&req), UNMATCHED);
    }
}
