use deadpool_postgres::Pool;
use movie_core::{Movie, MovieInput, MovieUpdate};
use tokio_postgres::Row;

use super::log::{LoggedClient, QueryLog};
use crate::error::AppError;

pub(crate) const MOVIE_COLUMNS: &str =
    "id, title, description, genres, uuid, created_at, updated_at";

/// Repository for movies stored locally
#[derive(Clone)]
pub struct MovieRepository {
    pool: Pool,
    log: QueryLog,
}

impl MovieRepository {
    pub fn new(pool: Pool, log: QueryLog) -> Self {
        Self { pool, log }
    }

    pub async fn list(&self) -> Result<Vec<Movie>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movie ORDER BY id");
        let rows = client.query(&sql, &[]).await?;
        Ok(rows.iter().map(movie_from_row).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Movie>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movie WHERE id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(movie_from_row))
    }

    pub async fn create(&self, movie: &MovieInput) -> Result<Movie, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!(
            "INSERT INTO movie (title, description, genres) VALUES ($1, $2, $3) RETURNING {MOVIE_COLUMNS}"
        );
        let row = client
            .query_one(&sql, &[&movie.title, &movie.description, &movie.genres])
            .await?;
        Ok(movie_from_row(&row))
    }

    pub async fn update(&self, id: i64, changes: &MovieUpdate) -> Result<Option<Movie>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!(
            "UPDATE movie SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                genres = COALESCE($4, genres), \
                updated_at = now() \
             WHERE id = $1 RETURNING {MOVIE_COLUMNS}"
        );
        let row = client
            .query_opt(
                &sql,
                &[&id, &changes.title, &changes.description, &changes.genres],
            )
            .await?;
        Ok(row.as_ref().map(movie_from_row))
    }
}

pub(crate) fn movie_from_row(row: &Row) -> Movie {
    Movie {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        genres: row.get("genres"),
        uuid: row.get("uuid"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
