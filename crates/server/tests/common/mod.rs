//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
};
use chrono::Utc;
use deadpool_postgres::{Config as PgConfig, Pool, Runtime};
use http_body_util::BodyExt;
use movie_core::{StoredTrackingRecord, TrackingRecord};
use parking_lot::Mutex;
use tokio_postgres::NoTls;
use tower::ServiceExt;

use movie_server::config::{Config, TrackingConfig};
use movie_server::tracking::{TrackingError, TrackingStore};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

/// In-memory tracking store
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<TrackingRecord>>>,
}

impl MemoryStore {
    pub fn records(&self) -> Vec<TrackingRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn insert(&self, record: &TrackingRecord) -> Result<(), TrackingError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64, TrackingError> {
        Ok(self.records.lock().len() as u64)
    }

    async fn reset(&self) -> Result<u64, TrackingError> {
        let mut records = self.records.lock();
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<StoredTrackingRecord>, TrackingError> {
        let now = Utc::now();
        Ok(self
            .records
            .lock()
            .iter()
            .enumerate()
            .map(|(i, record)| StoredTrackingRecord {
                id: i as i64 + 1,
                record: record.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect())
    }
}

/// Store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl TrackingStore for FailingStore {
    async fn insert(&self, _record: &TrackingRecord) -> Result<(), TrackingError> {
        Err(TrackingError::Persist("storage offline".to_string()))
    }

    async fn count(&self) -> Result<u64, TrackingError> {
        Err(TrackingError::Persist("storage offline".to_string()))
    }

    async fn reset(&self) -> Result<u64, TrackingError> {
        Err(TrackingError::Persist("storage offline".to_string()))
    }

    async fn list(&self) -> Result<Vec<StoredTrackingRecord>, TrackingError> {
        Err(TrackingError::Persist("storage offline".to_string()))
    }
}

/// Pool pointing at an unreachable database; connects only on first use
pub fn lazy_pool() -> Pool {
    let mut cfg = PgConfig::new();
    cfg.url = Some("postgres://nobody@127.0.0.1:1/none".to_string());
    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .expect("Failed to create pool")
}

pub fn test_config(environment: &str) -> Config {
    Config {
        database_url: String::new(),
        bind_address: "0.0.0.0:0".to_string(),
        cors_origins: vec!["*".to_string()],
        tracking: TrackingConfig::new(environment, "node-test").unwrap(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_access_ttl_secs: 300,
        jwt_refresh_ttl_secs: 86_400,
        movie_api: None,
        default_page_size: 10,
        max_page_size: 100,
    }
}

/// Attach the peer address the server would normally provide
pub fn with_peer(mut request: Request<Body>) -> Request<Body> {
    let addr: SocketAddr = "10.0.0.7:40000".parse().expect("valid address");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Send a request and return (status, headers, body text)
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.clone().oneshot(request).await.expect("Request failed");
    send_response(response).await
}

/// Split a response into (status, headers, body text)
pub async fn send_response(response: axum::response::Response) -> (StatusCode, HeaderMap, String) {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}
