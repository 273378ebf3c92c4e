use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use deadpool_postgres::Pool;

use crate::auth::{AuthUser, JwtKeys};
use crate::db::{QueryLog, UserRepository};

/// JWT authentication state
#[derive(Clone)]
pub struct JwtAuth {
    keys: JwtKeys,
    pool: Pool,
}

impl JwtAuth {
    pub fn new(keys: JwtKeys, pool: Pool) -> Self {
        Self { keys, pool }
    }

    /// Resolve the bearer token to an active user, or `None`
    async fn authenticate(&self, headers: &HeaderMap, log: &QueryLog) -> Option<AuthUser> {
        let token = bearer_token(headers)?;

        let claims = match self.keys.verify_access(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                return None;
            }
        };
        let user_id = claims.user_id()?;

        match UserRepository::new(self.pool.clone(), log.clone())
            .get(user_id)
            .await
        {
            Ok(Some(user)) if user.is_active => Some(AuthUser {
                id: user.id,
                is_superuser: user.is_superuser,
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(user_id, error = ?e, "Failed to load token user");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that attaches the authenticated user, if any.
///
/// Never rejects; handlers that need a user extract [`AuthUser`] and answer
/// 401 when it is missing.
pub async fn auth_middleware(
    State(auth): State<JwtAuth>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let log = request
        .extensions()
        .get::<QueryLog>()
        .cloned()
        .unwrap_or_default();

    let user = auth.authenticate(request.headers(), &log).await;
    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }

    let mut response = next.run(request).await;
    if let Some(user) = user {
        response.extensions_mut().insert(user);
    }
    response
}
