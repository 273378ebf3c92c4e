//! Authentication: JWT tokens, password hashing, and the caller's identity

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtKeys, TokenPair};

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Authenticated principal, resolved by the auth middleware.
///
/// Present in request extensions for handlers and copied into response
/// extensions so outer layers can attribute the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub is_superuser: bool,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().copied().ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })
    }
}
