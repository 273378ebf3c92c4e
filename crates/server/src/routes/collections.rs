//! Collection endpoints

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use deadpool_postgres::Pool;
use movie_core::{CollectionInput, Page, PageRequest};
use serde::Deserialize;
use serde_json::json;

use super::ApiSettings;
use crate::auth::AuthUser;
use crate::db::{CollectionOrdering, CollectionRepository, CollectionScope, QueryLog};
use crate::error::AppError;

/// Query parameters for GET /collection
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ListParams {
    /// Relative URL of page `number`, keeping the other parameters
    fn link(&self, number: u64, page_size: u64) -> String {
        let mut url = format!("/collection?page={}&page_size={}", number, page_size);
        if let Some(ref search) = self.search {
            url.push_str("&search=");
            url.push_str(&urlencoding::encode(search));
        }
        if let Some(ref ordering) = self.ordering {
            url.push_str("&ordering=");
            url.push_str(&urlencoding::encode(ordering));
        }
        url
    }
}

fn scope(auth: &AuthUser) -> CollectionScope {
    if auth.is_superuser {
        CollectionScope::All
    } else {
        CollectionScope::Owner(auth.id)
    }
}

/// Only superusers may assign a collection to somebody else
fn ensure_may_assign(auth: &AuthUser, owner: Option<i64>) -> Result<(), AppError> {
    match owner {
        Some(owner) if owner != auth.id && !auth.is_superuser => Err(AppError::Forbidden(
            "You may not assign collections to other users".to_string(),
        )),
        _ => Ok(()),
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Collection {} not found", id))
}

/// GET /collection - Paginated, searchable list of visible collections
pub async fn list(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    Extension(settings): Extension<ApiSettings>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = PageRequest::new(
        params.page,
        params.page_size,
        settings.default_page_size,
        settings.max_page_size,
    );
    let ordering = CollectionOrdering::parse(params.ordering.as_deref());

    let (collections, count) = CollectionRepository::new(pool, log)
        .list(scope(&auth), params.search.as_deref(), ordering, &request)
        .await?;

    if !request.in_range(count) {
        return Err(AppError::NotFound("Invalid page.".to_string()));
    }

    let page = Page::new(&request, count, collections, |n| {
        params.link(n, request.page_size)
    });
    Ok(Json(page))
}

/// POST /collection - Create a collection with its movies
pub async fn create(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Json(body): Json<CollectionInput>,
) -> Result<impl IntoResponse, AppError> {
    body.validate_full()?;
    ensure_may_assign(&auth, body.user)?;
    let owner = body.user.unwrap_or(auth.id);

    let collection = CollectionRepository::new(pool, log)
        .create(owner, &body)
        .await?;

    tracing::info!(
        collection_id = collection.id,
        movies = collection.movies.len(),
        "Collection created"
    );
    Ok((StatusCode::CREATED, Json(collection)))
}

/// GET /collection/{id}
pub async fn read(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    CollectionRepository::new(pool, log)
        .get(id, scope(&auth))
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// PUT /collection/{id} - Full update
pub async fn replace(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<CollectionInput>,
) -> Result<impl IntoResponse, AppError> {
    body.validate_full()?;
    apply_update(pool, log, auth, id, body).await
}

/// PATCH /collection/{id} - Partial update
pub async fn update(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<CollectionInput>,
) -> Result<impl IntoResponse, AppError> {
    body.validate_partial()?;
    apply_update(pool, log, auth, id, body).await
}

async fn apply_update(
    pool: Pool,
    log: QueryLog,
    auth: AuthUser,
    id: i64,
    body: CollectionInput,
) -> Result<Json<movie_core::Collection>, AppError> {
    ensure_may_assign(&auth, body.user)?;
    CollectionRepository::new(pool, log)
        .update(id, scope(&auth), &body)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// DELETE /collection/{id}
pub async fn delete(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = CollectionRepository::new(pool, log)
        .delete(id, scope(&auth))
        .await?;
    if !deleted {
        return Err(not_found(id));
    }
    tracing::info!(collection_id = id, "Collection deleted");
    Ok(Json(json!(["collection deleted successfully"])))
}
