//! Prometheus metrics collection middleware
//!
//! Records `http_requests_total` (counter) and `http_request_duration_seconds`
//! (histogram) for every request, with method/path/status labels.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Collapse id segments so every collection/movie/user shares one path label.
/// Numeric and UUID segments become `:id`.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            let is_id = (!seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()))
                || uuid::Uuid::try_parse(seg).is_ok();
            if is_id { ":id" } else { seg }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records request count and duration metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();

    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(elapsed);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/collection/42"), "/collection/:id");
        assert_eq!(
            normalize_path("/db/movies/6f1f4b8e-8f0e-4f8a-9d55-0d2a4c1e9b11"),
            "/db/movies/:id"
        );
        assert_eq!(normalize_path("/request-count/reset"), "/request-count/reset");
    }
}
