//! Movie endpoints: the external catalog proxy and locally stored movies

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deadpool_postgres::Pool;
use movie_core::{MovieInput, MovieUpdate};
use serde_json::json;

use crate::auth::AuthUser;
use crate::catalog::CatalogClient;
use crate::db::{MovieRepository, QueryLog};
use crate::error::AppError;

fn catalog_error(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// GET /movies - Proxy the external catalog, forwarding query parameters
pub async fn catalog(
    Extension(client): Extension<Option<CatalogClient>>,
    _auth: AuthUser,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let Some(client) = client else {
        return catalog_error("Movie catalog is not configured");
    };

    match client.list_movies(&query).await {
        Ok((status, body)) => (status, Json(body)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Movie catalog request failed");
            catalog_error(e.to_string())
        }
    }
}

/// GET /db/movies - List stored movies
pub async fn list(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let movies = MovieRepository::new(pool, log).list().await?;
    Ok(Json(movies))
}

/// POST /db/movies - Store a movie
pub async fn create(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    _auth: AuthUser,
    Json(body): Json<MovieInput>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let movie = MovieRepository::new(pool, log).create(&body).await?;
    tracing::info!(movie_id = movie.id, "Movie stored");
    Ok((StatusCode::CREATED, Json(movie)))
}

/// GET /db/movies/{id}
pub async fn read(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match MovieRepository::new(pool, log).get(id).await? {
        Some(movie) => Ok(Json(movie)),
        None => Err(AppError::NotFound(format!("Movie {} not found", id))),
    }
}

/// PUT /db/movies/{id} - Replace a movie's fields
pub async fn replace(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<MovieInput>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let changes = MovieUpdate {
        title: Some(body.title),
        description: Some(body.description),
        genres: body.genres,
    };
    apply_update(pool, log, id, changes).await
}

/// PATCH /db/movies/{id} - Update the given fields
pub async fn update(
    State(pool): State<Pool>,
    Extension(log): Extension<QueryLog>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<MovieUpdate>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    apply_update(pool, log, id, body).await
}

async fn apply_update(
    pool: Pool,
    log: QueryLog,
    id: i64,
    changes: MovieUpdate,
) -> Result<Json<movie_core::Movie>, AppError> {
    match MovieRepository::new(pool, log).update(id, &changes).await? {
        Some(movie) => Ok(Json(movie)),
        None => Err(AppError::NotFound(format!("Movie {} not found", id))),
    }
}
