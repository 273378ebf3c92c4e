//! Request tracking through the HTTP stack, without a database.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use movie_core::{ANONYMOUS_USER_ID, LARGE_CONTENT_PLACEHOLDER, QueryCount};
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;

use common::{FailingStore, MemoryStore, lazy_pool, send, test_config, with_peer};
use movie_server::auth::AuthUser;
use movie_server::config::TrackingConfig;
use movie_server::db::QueryLog;
use movie_server::routes::requests;
use movie_server::tracking::{NODE_ID_HEADER, RequestId, Tracker, TrackingStore, tracking_middleware};

async fn two_selects(Extension(log): Extension<QueryLog>) -> Json<JsonValue> {
    log.record("SELECT id FROM movie", Duration::from_micros(300));
    log.record("select * from collection where id = $1", Duration::from_micros(200));
    tokio::time::sleep(Duration::from_millis(5)).await;
    Json(json!({"movies": []}))
}

async fn write_statements(Extension(log): Extension<QueryLog>) -> StatusCode {
    log.record("BEGIN", Duration::ZERO);
    log.record("INSERT INTO movie (title) VALUES ($1)", Duration::ZERO);
    log.record("UPDATE collection SET title = $1", Duration::ZERO);
    log.record("WITH gone AS (DELETE FROM movie_collection) SELECT 1", Duration::ZERO);
    log.record("COMMIT", Duration::ZERO);
    StatusCode::NO_CONTENT
}

async fn as_user() -> Response {
    let mut response = Json(json!({"ok": true})).into_response();
    response.extensions_mut().insert(AuthUser {
        id: 42,
        is_superuser: false,
    });
    response
}

async fn untyped_body() -> Response {
    Response::new(Body::from("raw bytes"))
}

async fn echo_id(Extension(id): Extension<RequestId>) -> String {
    id.0
}

async fn broken_stream() -> Response {
    Response::builder()
        .header("content-type", "application/json")
        .body(failing_body(r#"{"partial""#, "connection reset"))
        .unwrap()
}

async fn byte_count(body: Bytes) -> String {
    body.len().to_string()
}

fn failing_body(first: &'static str, error: &str) -> Body {
    let chunks = vec![Ok::<_, std::io::Error>(first), Err(std::io::Error::other(error.to_string()))];
    Body::from_stream(futures::stream::iter(chunks))
}

fn routes() -> Router {
    Router::new()
        .route("/selects", get(two_selects))
        .route("/writes", post(write_statements))
        .route("/user", get(as_user))
        .route("/raw", get(untyped_body))
        .route("/id", get(echo_id))
        .route("/broken", get(broken_stream))
        .route("/upload", post(byte_count))
}

fn tracked_app(environment: &str, store: Arc<dyn TrackingStore>) -> Router {
    let tracker = Tracker::new(TrackingConfig::new(environment, "node-7").unwrap(), store);
    routes().layer(from_fn_with_state(tracker, tracking_middleware))
}

/// Send a request and read the body frame by frame, keeping any stream error
async fn send_streamed(app: &Router, request: Request<Body>) -> (StatusCode, Bytes, Option<String>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let mut body = response.into_body();
    let mut received = BytesMut::new();
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    received.extend_from_slice(&data);
                }
            }
            Err(error) => return (status, received.freeze(), Some(error.to_string())),
        }
    }
    (status, received.freeze(), None)
}

fn get_request(uri: &str) -> Request<Body> {
    with_peer(Request::get(uri).body(Body::empty()).unwrap())
}

#[tokio::test]
async fn test_counts_selects_and_times_request() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let (status, headers, body) = send(&app, get_request("/selects")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[NODE_ID_HEADER], "node-7");
    assert_eq!(body, r#"{"movies":[]}"#);

    let records = store.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.query_count,
        QueryCount { select: 2, insert: 0, update: 0, delete: 0 }
    );
    assert!(record.execution_time >= Duration::from_millis(5));
    assert_eq!(record.response_status, "200");
    assert_eq!(record.response_data, body);
    assert_eq!(record.method, "GET");
    assert_eq!(record.path, "/selects");
    assert_eq!(record.ip_address, "10.0.0.7");
    assert_eq!(record.node_id, "node-7");
    assert_eq!(record.request_type, "incoming");
    assert_eq!(record.user_id, ANONYMOUS_USER_ID);
}

#[tokio::test]
async fn test_counts_each_write_verb() {
    let store = MemoryStore::default();
    let app = tracked_app("PROD", Arc::new(store.clone()));

    let request = with_peer(Request::post("/writes").body(Body::empty()).unwrap());
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let record = &store.records()[0];
    assert_eq!(
        record.query_count,
        QueryCount { select: 0, insert: 1, update: 1, delete: 1 }
    );
}

#[tokio::test]
async fn test_failing_store_leaves_response_intact() {
    let app = tracked_app("DEV", Arc::new(FailingStore));

    let (status, headers, body) = send(&app, get_request("/selects")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"movies":[]}"#);
    assert_eq!(headers[NODE_ID_HEADER], "node-7");
}

#[tokio::test]
async fn test_missing_client_address_drops_record_only() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let request = Request::get("/selects").body(Body::empty()).unwrap();
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[NODE_ID_HEADER], "node-7");
    assert!(store.records().is_empty());

    let request = Request::get("/selects")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    send(&app, request).await;
    assert_eq!(store.records()[0].ip_address, "203.0.113.9");
}

#[tokio::test]
async fn test_environment_gates_persistence() {
    let store = MemoryStore::default();
    let app = tracked_app("STAGING", Arc::new(store.clone()));

    let (status, headers, _) = send(&app, get_request("/selects")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[NODE_ID_HEADER], "node-7");
    assert!(store.records().is_empty());

    let store = MemoryStore::default();
    let app = tracked_app("LOCAL", Arc::new(store.clone()));
    send(&app, get_request("/selects")).await;
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn test_principal_from_response() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    send(&app, get_request("/user")).await;
    assert_eq!(store.records()[0].user_id, 42);
}

#[tokio::test]
async fn test_untyped_body_gets_placeholder() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let (status, _, body) = send(&app, get_request("/raw")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "raw bytes");
    assert_eq!(store.records()[0].response_data, LARGE_CONTENT_PLACEHOLDER);
}

#[tokio::test]
async fn test_request_details_captured() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let request = with_peer(
        Request::post("/writes?tag=a&tag=b&page=2")
            .header("cookie", "sessionid=abc; theme=dark")
            .header("client", "mobile-app")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"Alien"}"#))
            .unwrap(),
    );
    send(&app, request).await;

    let record = &store.records()[0];
    assert_eq!(record.body, r#"{"title":"Alien"}"#);
    assert_eq!(record.client.as_deref(), Some("mobile-app"));
    assert_eq!(record.query_params, json!({"tag": ["a", "b"], "page": "2"}));
    assert_eq!(record.cookies, json!({"sessionid": "abc", "theme": "dark"}));
    assert_eq!(record.headers["content-type"], "application/json");
}

#[tokio::test]
async fn test_response_stream_error_reaches_client() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let untracked = send_streamed(&routes(), get_request("/broken")).await;
    let tracked = send_streamed(&app, get_request("/broken")).await;
    assert_eq!(untracked.0, StatusCode::OK);
    assert_eq!(tracked, untracked);
    assert_eq!(tracked.1, r#"{"partial""#);
    assert_eq!(tracked.2.as_deref(), Some("connection reset"));

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].response_status, "200");
    assert_eq!(records[0].response_data, "");
}

#[tokio::test]
async fn test_request_stream_error_reaches_handler() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));
    let upload = || {
        with_peer(
            Request::post("/upload")
                .header("content-type", "application/json")
                .body(failing_body(r#"{"ti"#, "client went away"))
                .unwrap(),
        )
    };

    let (untracked_status, _, untracked_body) = send(&routes(), upload()).await;
    let (status, headers, body) = send(&app, upload()).await;
    assert_eq!(untracked_status, StatusCode::BAD_REQUEST);
    assert_eq!(status, untracked_status);
    assert_eq!(body, untracked_body);
    assert!(body.contains("client went away"));
    assert_eq!(headers[NODE_ID_HEADER], "node-7");

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body, "");
    assert_eq!(records[0].method, "POST");
    assert_eq!(records[0].response_status, "400");
}

#[tokio::test]
async fn test_request_id_visible_to_handler() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let (_, _, body) = send(&app, get_request("/id")).await;
    assert_eq!(store.records()[0].request_id, body);
}

#[tokio::test]
async fn test_concurrent_requests_get_isolated_records() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));

    let handles: Vec<_> = (0..1000)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { send(&app, get_request("/selects")).await })
        })
        .collect();
    for handle in handles {
        let (status, _, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let records = store.records();
    assert_eq!(records.len(), 1000);
    let mut ids: Vec<_> = records.iter().map(|r| r.request_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1000);
    assert!(records.iter().all(|r| r.query_count.select == 2 && r.query_count.total() == 2));
}

#[tokio::test]
async fn test_anonymous_request_through_full_app() {
    let store = MemoryStore::default();
    let app = movie_server::build_app_with_store(
        lazy_pool(),
        &test_config("DEV"),
        Arc::new(store.clone()),
    );

    let (status, headers, body) = send(&app, get_request("/collection")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[NODE_ID_HEADER], "node-test");
    let body: JsonValue = serde_json::from_str(&body).unwrap();
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, ANONYMOUS_USER_ID);
    assert_eq!(records[0].response_status, "401");
    assert_eq!(records[0].query_count.total(), 0);
}

#[tokio::test]
async fn test_invalid_token_is_anonymous() {
    let store = MemoryStore::default();
    let app = movie_server::build_app_with_store(
        lazy_pool(),
        &test_config("DEV"),
        Arc::new(store.clone()),
    );

    let request = with_peer(
        Request::get("/db/movies")
            .header("authorization", "Bearer not-a-token")
            .body(Body::empty())
            .unwrap(),
    );
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(store.records()[0].user_id, ANONYMOUS_USER_ID);
}

#[tokio::test]
async fn test_request_count_handlers() {
    let store = MemoryStore::default();
    let app = tracked_app("DEV", Arc::new(store.clone()));
    send(&app, get_request("/selects")).await;
    send(&app, get_request("/selects")).await;

    let shared: Arc<dyn TrackingStore> = Arc::new(store.clone());
    let admin = AuthUser { id: 1, is_superuser: true };

    let response = requests::count(Extension(shared.clone()), admin)
        .await
        .unwrap()
        .into_response();
    let (_, _, body) = common::send_response(response).await;
    assert_eq!(
        serde_json::from_str::<JsonValue>(&body).unwrap(),
        json!({"requests": "2 requests are served by server till now"})
    );

    let response = requests::reset(Extension(shared.clone()), admin)
        .await
        .unwrap()
        .into_response();
    let (status, _, body) = common::send_response(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<JsonValue>(&body).unwrap(),
        json!({"message": "request count reset successfully"})
    );
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn test_request_count_store_failure_is_500() {
    let shared: Arc<dyn TrackingStore> = Arc::new(FailingStore);
    let admin = AuthUser { id: 1, is_superuser: true };

    let response = requests::count(Extension(shared), admin).await.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
