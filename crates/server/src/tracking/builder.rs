//! Assembly of a [`TrackingRecord`] from one request/response exchange

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Query},
    http::{HeaderMap, Method, StatusCode, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use movie_core::{
    ANONYMOUS_USER_ID, QueryCount, REQUEST_TYPE_INCOMING, TrackingRecord, format_request_time,
};
use serde_json::{Map, Value as JsonValue};

use super::TrackingError;

/// Request state captured at entry, before the handler consumes the body
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
    pub body: Bytes,
}

impl RequestSnapshot {
    pub fn capture(parts: &Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
                .map(|Query(pairs)| pairs)
                .unwrap_or_default(),
            headers: parts.headers.clone(),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0),
            body,
        }
    }

    /// Peer address, falling back to the first `X-Forwarded-For` hop
    pub fn client_ip(&self) -> Option<String> {
        self.remote_addr.map(|addr| addr.ip().to_string()).or_else(|| {
            self.headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        })
    }
}

/// Everything known about a request once its response is ready
#[derive(Debug)]
pub struct Exchange<'a> {
    pub request_id: &'a str,
    pub request: &'a RequestSnapshot,
    /// Authenticated user id, `None` for anonymous requests
    pub principal: Option<i64>,
    pub status: StatusCode,
    pub response_data: String,
    pub execution_time: Duration,
    pub query_count: QueryCount,
}

/// Build the audit record for one exchange.
///
/// Reads the snapshot without modifying it. Fails when the client address
/// cannot be determined or the request id is missing.
pub fn build_record(
    exchange: Exchange<'_>,
    node_id: &str,
    now: DateTime<Utc>,
) -> Result<TrackingRecord, TrackingError> {
    let request = exchange.request;

    if exchange.request_id.is_empty() {
        return Err(TrackingError::Build("request id is empty".to_string()));
    }
    let ip_address = request
        .client_ip()
        .ok_or_else(|| TrackingError::Build("client address unavailable".to_string()))?;

    Ok(TrackingRecord {
        request_id: exchange.request_id.to_string(),
        user_id: exchange.principal.unwrap_or(ANONYMOUS_USER_ID),
        method: request.method.to_string(),
        path: request.path.clone(),
        ip_address,
        client: request
            .headers
            .get("client")
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
        cookies: cookies_json(&request.headers),
        query_params: query_json(&request.query),
        headers: headers_json(&request.headers),
        body: String::from_utf8_lossy(&request.body).into_owned(),
        response_status: exchange.status.as_u16().to_string(),
        response_data: exchange.response_data,
        execution_time: exchange.execution_time,
        request_time: format_request_time(now),
        request_date: now.date_naive(),
        query_count: exchange.query_count,
        node_id: node_id.to_string(),
        request_type: REQUEST_TYPE_INCOMING.to_string(),
    })
}

/// Fresh JSON object; repeated keys become arrays
fn query_json(query: &[(String, String)]) -> JsonValue {
    let mut map = Map::new();
    for (key, value) in query {
        let value = JsonValue::String(value.clone());
        match map.get_mut(key) {
            Some(JsonValue::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = JsonValue::Array(vec![first, value]);
            }
            None => {
                map.insert(key.clone(), value);
            }
        }
    }
    JsonValue::Object(map)
}

/// Header values as text; repeated headers are joined with `, `
fn headers_json(headers: &HeaderMap) -> JsonValue {
    let mut map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_string(), JsonValue::String(joined));
    }
    JsonValue::Object(map)
}

fn cookies_json(headers: &HeaderMap) -> JsonValue {
    let jar = CookieJar::from_headers(headers);
    JsonValue::Object(
        jar.iter()
            .map(|c| (c.name().to_string(), JsonValue::String(c.value().to_string())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};
    use chrono::TimeZone;
    use movie_core::SqlVerb;

    fn snapshot(uri: &str) -> RequestSnapshot {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("cookie", "theme=dark; lang=en")
            .header("client", "ios-app")
            .header("accept", "application/json")
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5151))));
        RequestSnapshot::capture(&parts, Bytes::from_static(br#"{"title":"Heat"}"#))
    }

    fn exchange<'a>(request: &'a RequestSnapshot, principal: Option<i64>) -> Exchange<'a> {
        let mut query_count = QueryCount::default();
        query_count.increment(SqlVerb::Insert);
        Exchange {
            request_id: "3f1c7a52-0d4e-4b83-a3c9-52f0e0f2b6aa",
            request,
            principal,
            status: StatusCode::CREATED,
            response_data: r#"{"id":1}"#.to_string(),
            execution_time: Duration::from_millis(12),
            query_count,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_builds_full_record() {
        let request = snapshot("/collection?page=2&search=noir+films&tag=a&tag=b");
        let record = build_record(exchange(&request, Some(9)), "node-a", now()).unwrap();

        assert_eq!(record.user_id, 9);
        assert_eq!(record.method, "POST");
        assert_eq!(record.path, "/collection");
        assert_eq!(record.ip_address, "10.0.0.7");
        assert_eq!(record.client.as_deref(), Some("ios-app"));
        assert_eq!(record.body, r#"{"title":"Heat"}"#);
        assert_eq!(record.response_status, "201");
        assert_eq!(record.request_time, "2024-06-01 12:30:00");
        assert_eq!(record.request_date.to_string(), "2024-06-01");
        assert_eq!(record.node_id, "node-a");
        assert_eq!(record.request_type, "incoming");
        assert_eq!(record.query_count.insert, 1);
        assert_eq!(
            record.query_params,
            serde_json::json!({"page": "2", "search": "noir films", "tag": ["a", "b"]})
        );
        assert_eq!(
            record.cookies,
            serde_json::json!({"theme": "dark", "lang": "en"})
        );
        assert_eq!(record.headers["accept"], "application/json");
    }

    #[test]
    fn test_anonymous_principal() {
        let request = snapshot("/collection");
        let record = build_record(exchange(&request, None), "node-a", now()).unwrap();
        assert_eq!(record.user_id, ANONYMOUS_USER_ID);
    }

    #[test]
    fn test_snapshot_not_mutated() {
        let request = snapshot("/collection?from=2024-01-01T10:00:00Z&x=1");
        let before = request.query.clone();

        build_record(exchange(&request, None), "node-a", now()).unwrap();
        assert_eq!(request.query, before);
    }

    #[test]
    fn test_forwarded_for_fallback() {
        let mut request = snapshot("/");
        request.remote_addr = None;
        request.headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(request.client_ip().as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_missing_address_fails() {
        let mut request = snapshot("/");
        request.remote_addr = None;

        let err = build_record(exchange(&request, None), "node-a", now()).unwrap_err();
        assert!(matches!(err, TrackingError::Build(_)));
    }
}
