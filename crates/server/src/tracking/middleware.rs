//! Request-tracking middleware
//!
//! For every request: start a timer, give the handler a fresh query log, run
//! the handler, then count statements by verb, capture the response body, and
//! write one tracking record. Tracking failures are logged and never change
//! the response. Every response carries the `processor_node_id` header.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use movie_core::{QueryCounter, RequestTimer, TrackingRecord};
use uuid::Uuid;

use super::builder::{Exchange, RequestSnapshot, build_record};
use super::capture::{buffer_body, capture_response};
use super::store::TrackingStore;
use crate::auth::AuthUser;
use crate::config::TrackingConfig;
use crate::db::QueryLog;

/// Response header naming the node that served the request
pub const NODE_ID_HEADER: &str = "processor_node_id";

/// Request id assigned by the tracking middleware, available to handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Shared state of the tracking middleware
#[derive(Clone)]
pub struct Tracker {
    config: Arc<TrackingConfig>,
    store: Arc<dyn TrackingStore>,
}

impl Tracker {
    pub fn new(config: TrackingConfig, store: Arc<dyn TrackingStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn TrackingStore> {
        self.store.clone()
    }

    fn stamp(&self, mut response: Response) -> Response {
        response
            .headers_mut()
            .insert(NODE_ID_HEADER, self.config.node_header().clone());
        response
    }

    /// Build and store the record. Errors stop here.
    async fn persist(&self, exchange: Exchange<'_>) {
        let request_id = exchange.request_id.to_string();

        let record = match build_record(exchange, self.config.node_id(), Utc::now()) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(target: "tracking", request_id = %request_id, error = %e, "Tracking record dropped");
                metrics::counter!("tracking_records_total", "outcome" => "build_failed").increment(1);
                return;
            }
        };

        if !self.config.persists() {
            tracing::debug!(
                target: "tracking",
                request_id = %request_id,
                environment = %self.config.environment(),
                "Tracking persistence disabled for this environment"
            );
            metrics::counter!("tracking_records_total", "outcome" => "skipped").increment(1);
            return;
        }

        match self.store.insert(&record).await {
            Ok(()) => {
                log_record(&record);
                metrics::counter!("tracking_records_total", "outcome" => "persisted").increment(1);
            }
            Err(e) => {
                tracing::error!(target: "tracking", request_id = %request_id, error = %e, "Tracking record lost");
                metrics::counter!("tracking_records_total", "outcome" => "persist_failed")
                    .increment(1);
            }
        }
    }
}

fn log_record(record: &TrackingRecord) {
    tracing::debug!(
        target: "tracking",
        request_id = %record.request_id,
        method = %record.method,
        path = %record.path,
        status = %record.response_status,
        user_id = record.user_id,
        execution_ms = record.execution_time.as_secs_f64() * 1000.0,
        selects = record.query_count.select,
        inserts = record.query_count.insert,
        updates = record.query_count.update,
        deletes = record.query_count.delete,
        "Request tracked"
    );
}

/// Middleware that times, profiles and records every request
pub async fn tracking_middleware(
    State(tracker): State<Tracker>,
    request: Request,
    next: Next,
) -> Response {
    // Entry
    let request_id = Uuid::new_v4().to_string();
    let query_log = QueryLog::new();
    let timer = RequestTimer::start();

    // A failed upload is recorded with an empty body and replayed to the
    // handler, which decides the response
    let (mut parts, body) = request.into_parts();
    let (captured, body) = match buffer_body(body).await {
        Ok(bytes) => (bytes.clone(), Body::from(bytes)),
        Err(failure) => {
            tracing::warn!(target: "tracking", request_id = %request_id, error = %failure.error, "Failed to read request body");
            (Bytes::new(), failure.into_body())
        }
    };
    let snapshot = RequestSnapshot::capture(&parts, captured);
    parts.extensions.insert(query_log.clone());
    parts.extensions.insert(RequestId(request_id.clone()));

    // Handling
    let response = next.run(Request::from_parts(parts, body)).await;

    // Exit capture
    let execution_time = timer.elapsed();
    let query_count = QueryCounter::count(&query_log.snapshot());
    let principal = response.extensions().get::<AuthUser>().map(|user| user.id);
    let status = response.status();
    let (response, response_data) = capture_response(response).await;

    // Persist attempt
    tracker
        .persist(Exchange {
            request_id: &request_id,
            request: &snapshot,
            principal,
            status,
            response_data,
            execution_time,
            query_count,
        })
        .await;

    tracker.stamp(response)
}
