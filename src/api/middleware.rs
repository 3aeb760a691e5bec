/// Request middleware: bearer token parsing and request metrics
use crate::metrics;
use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Record request count and latency, labelled by route template
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Route templates keep label cardinality bounded
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    metrics::HTTP_REQUESTS_ACTIVE.inc();
    let response = next.run(request).await;
    metrics::HTTP_REQUESTS_ACTIVE.dec();

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
