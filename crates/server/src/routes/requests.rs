//! Request-count reporting over the tracking table

use std::sync::Arc;

use axum::{Extension, Json, response::IntoResponse};
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::tracking::TrackingStore;

/// GET /request-count - Number of tracked requests
pub async fn count(
    Extension(store): Extension<Arc<dyn TrackingStore>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let served = store.count().await?;
    Ok(Json(json!({
        "requests": format!("{} requests are served by server till now", served)
    })))
}

/// POST /request-count/reset - Delete every tracking record
pub async fn reset(
    Extension(store): Extension<Arc<dyn TrackingStore>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let removed = store.reset().await?;
    tracing::info!(user_id = auth.id, removed, "Request count reset");
    Ok(Json(json!({ "message": "request count reset successfully" })))
}

/// GET /request-count/request-log - Every stored tracking record
pub async fn request_log(
    Extension(store): Extension<Arc<dyn TrackingStore>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list().await?))
}
