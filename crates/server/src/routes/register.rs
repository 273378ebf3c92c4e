//! Registration and token endpoints (no authentication required)

use axum::{Extension, Json, extract::State, response::IntoResponse};
use deadpool_postgres::Pool;
use movie_core::{Credentials, NewUser};
use serde_json::json;

use crate::auth::{JwtKeys, TokenPair, password};
use crate::db::{QueryLog, UserRecord, UserRepository};
use crate::error::AppError;

fn issue(keys: &JwtKeys, user_id: i64) -> Result<TokenPair, AppError> {
    keys.issue_pair(user_id)
        .map_err(|e| AppError::Internal(format!("Failed to issue token: {}", e)))
}

/// POST /register - Create an account and return a token pair
pub async fn register(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    Extension(keys): Extension<JwtKeys>,
    Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let password_hash = password::hash(&body.password)?;

    // Self-registration never grants elevated roles
    let user = UserRepository::new(pool, log)
        .create(UserRecord {
            username: &body.username,
            password_hash: &password_hash,
            email: &body.email,
            first_name: &body.first_name,
            last_name: &body.last_name,
            is_superuser: false,
            is_staff: false,
            is_active: body.is_active,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok(Json(issue(&keys, user.id)?))
}

/// POST /register/generate_token - Exchange credentials for a token pair
pub async fn generate_token(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    Extension(keys): Extension<JwtKeys>,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let found = UserRepository::new(pool, log)
        .find_credentials(&body.username)
        .await?;

    match found {
        Some((user, hash)) if user.is_active && password::verify(&body.password, &hash) => {
            let pair = issue(&keys, user.id)?;
            Ok(Json(json!({
                "refresh_token": pair.refresh_token,
                "access_token": pair.access_token,
            })))
        }
        _ => Ok(Json(
            json!({"message": "User does not exists with given credentials"}),
        )),
    }
}
