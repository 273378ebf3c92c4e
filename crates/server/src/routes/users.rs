//! User account endpoints

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use deadpool_postgres::Pool;
use movie_core::{NewUser, UserUpdate};

use crate::auth::{AuthUser, password};
use crate::db::{QueryLog, UserChanges, UserRecord, UserRepository};
use crate::error::AppError;

fn ensure_may_grant(auth: &AuthUser, is_superuser: bool, is_staff: bool) -> Result<(), AppError> {
    if (is_superuser || is_staff) && !auth.is_superuser {
        return Err(AppError::Forbidden(
            "Only superusers may grant staff or superuser status".to_string(),
        ));
    }
    Ok(())
}

/// Superusers see every account, others only their own
fn visible(auth: &AuthUser, id: i64) -> bool {
    auth.is_superuser || auth.id == id
}

/// GET /user - List visible users
pub async fn list(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let only = (!auth.is_superuser).then_some(auth.id);
    let users = UserRepository::new(pool, log).list(only).await?;
    Ok(Json(users))
}

/// POST /user - Create a user
pub async fn create(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    ensure_may_grant(&auth, body.is_superuser, body.is_staff)?;
    let password_hash = password::hash(&body.password)?;

    let user = UserRepository::new(pool, log)
        .create(UserRecord {
            username: &body.username,
            password_hash: &password_hash,
            email: &body.email,
            first_name: &body.first_name,
            last_name: &body.last_name,
            is_superuser: body.is_superuser,
            is_staff: body.is_staff,
            is_active: body.is_active,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /user/{id} - Read a user
pub async fn read(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !visible(&auth, id) {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }
    match UserRepository::new(pool, log).get(id).await? {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::NotFound(format!("User {} not found", id))),
    }
}

/// PUT|PATCH /user/{id} - Update a user
pub async fn update(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<UserUpdate>,
) -> Result<impl IntoResponse, AppError> {
    if !visible(&auth, id) {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }
    body.validate()?;
    ensure_may_grant(
        &auth,
        body.is_superuser.unwrap_or(false),
        body.is_staff.unwrap_or(false),
    )?;

    let password_hash = body.password.as_deref().map(password::hash).transpose()?;
    let changes = UserChanges {
        username: body.username,
        password_hash,
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        is_superuser: body.is_superuser,
        is_staff: body.is_staff,
        is_active: body.is_active,
    };

    match UserRepository::new(pool, log).update(id, changes).await? {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::NotFound(format!("User {} not found", id))),
    }
}
