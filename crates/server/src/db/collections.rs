use std::collections::HashMap;

use deadpool_postgres::Pool;
use movie_core::{Collection, CollectionInput, Movie, MovieInput, PageRequest, User};
use tokio_postgres::Row;

use super::log::{LoggedClient, LoggedTransaction, QueryLog};
use super::movies::movie_from_row;
use crate::error::AppError;

const COLLECTION_SELECT: &str = "SELECT c.id, c.title, c.description, c.collection_uuid, c.is_success, \
        c.created_at, c.updated_at, \
        u.id AS u_id, u.username AS u_username, u.email AS u_email, \
        u.first_name AS u_first_name, u.last_name AS u_last_name, \
        u.is_superuser AS u_is_superuser, u.is_staff AS u_is_staff, u.is_active AS u_is_active \
    FROM collection c JOIN users u ON u.id = c.user_id";

/// Which collections the caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionScope {
    All,
    Owner(i64),
}

impl CollectionScope {
    fn owner(&self) -> Option<i64> {
        match self {
            CollectionScope::All => None,
            CollectionScope::Owner(id) => Some(*id),
        }
    }
}

/// List ordering, newest first by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionOrdering {
    #[default]
    Newest,
    Title,
    TitleDesc,
}

impl CollectionOrdering {
    /// Parse an `ordering` query value; unknown fields fall back to the default
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("title") => CollectionOrdering::Title,
            Some("-title") => CollectionOrdering::TitleDesc,
            _ => CollectionOrdering::Newest,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            CollectionOrdering::Newest => "c.id DESC",
            CollectionOrdering::Title => "c.title ASC, c.id DESC",
            CollectionOrdering::TitleDesc => "c.title DESC, c.id DESC",
        }
    }
}

/// Repository for user collections and their movie links
#[derive(Clone)]
pub struct CollectionRepository {
    pool: Pool,
    log: QueryLog,
}

impl CollectionRepository {
    pub fn new(pool: Pool, log: QueryLog) -> Self {
        Self { pool, log }
    }

    /// One page of collections plus the total matching count
    pub async fn list(
        &self,
        scope: CollectionScope,
        search: Option<&str>,
        ordering: CollectionOrdering,
        page: &PageRequest,
    ) -> Result<(Vec<Collection>, u64), AppError> {
        let (limit, offset) = page
            .sql_bounds()
            .ok_or_else(|| AppError::NotFound("Invalid page.".to_string()))?;
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let owner = scope.owner();
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(escape_like);

        let filter = "($1::bigint IS NULL OR c.user_id = $1) \
            AND ($2::text IS NULL OR c.title ILIKE '%' || $2 || '%')";

        let count_sql = format!("SELECT COUNT(*) FROM collection c WHERE {filter}");
        let count: i64 = client
            .query_one(&count_sql, &[&owner, &search])
            .await?
            .get(0);

        let sql = format!(
            "{COLLECTION_SELECT} WHERE {filter} ORDER BY {} LIMIT $3 OFFSET $4",
            ordering.sql()
        );
        let rows = client
            .query(&sql, &[&owner, &search, &limit, &offset])
            .await?;

        let collections = attach_movies(&client, rows).await?;
        Ok((collections, count.max(0) as u64))
    }

    pub async fn get(&self, id: i64, scope: CollectionScope) -> Result<Option<Collection>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        fetch(&client, id, scope).await
    }

    /// Create a collection for `owner` and link its movies in one transaction
    pub async fn create(&self, owner: i64, input: &CollectionInput) -> Result<Collection, AppError> {
        let mut client = LoggedClient::connect(&self.pool, &self.log).await?;

        let tx = client.transaction().await?;
        let row = tx
            .query_one(
                "INSERT INTO collection (title, description, user_id, is_success) \
                 VALUES ($1, $2, $3, COALESCE($4, TRUE)) RETURNING id",
                &[
                    &input.title.as_deref().unwrap_or_default(),
                    &input.description.as_deref().unwrap_or_default(),
                    &owner,
                    &input.is_success,
                ],
            )
            .await?;
        let id: i64 = row.get(0);
        link_movies(&tx, id, &input.movies).await?;
        tx.commit().await?;

        fetch(&client, id, CollectionScope::All)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Collection {} vanished after insert", id)))
    }

    /// Update a visible collection; a non-empty movie list replaces the links
    pub async fn update(
        &self,
        id: i64,
        scope: CollectionScope,
        input: &CollectionInput,
    ) -> Result<Option<Collection>, AppError> {
        let mut client = LoggedClient::connect(&self.pool, &self.log).await?;
        let owner = scope.owner();

        let tx = client.transaction().await?;
        let updated = tx
            .query_opt(
                "UPDATE collection SET \
                    title = COALESCE($3, title), \
                    description = COALESCE($4, description), \
                    user_id = COALESCE($5, user_id), \
                    is_success = COALESCE($6, is_success), \
                    updated_at = now() \
                 WHERE id = $1 AND ($2::bigint IS NULL OR user_id = $2) RETURNING id",
                &[
                    &id,
                    &owner,
                    &input.title,
                    &input.description,
                    &input.user,
                    &input.is_success,
                ],
            )
            .await?;
        if updated.is_none() {
            return Ok(None);
        }

        if !input.movies.is_empty() {
            tx.execute(
                "DELETE FROM movie_collection WHERE collection_id = $1",
                &[&id],
            )
            .await?;
            link_movies(&tx, id, &input.movies).await?;
        }
        tx.commit().await?;

        fetch(&client, id, CollectionScope::All).await
    }

    /// Unlink movies and delete; `false` if the collection is not visible
    pub async fn delete(&self, id: i64, scope: CollectionScope) -> Result<bool, AppError> {
        let mut client = LoggedClient::connect(&self.pool, &self.log).await?;
        let owner = scope.owner();

        let tx = client.transaction().await?;
        tx.execute(
            "DELETE FROM movie_collection WHERE collection_id IN \
                (SELECT id FROM collection WHERE id = $1 AND ($2::bigint IS NULL OR user_id = $2))",
            &[&id, &owner],
        )
        .await?;
        let deleted = tx
            .execute(
                "DELETE FROM collection WHERE id = $1 AND ($2::bigint IS NULL OR user_id = $2)",
                &[&id, &owner],
            )
            .await?;
        tx.commit().await?;

        Ok(deleted > 0)
    }
}

/// Escape `LIKE` wildcards so the term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn fetch(
    client: &LoggedClient,
    id: i64,
    scope: CollectionScope,
) -> Result<Option<Collection>, AppError> {
    let sql = format!(
        "{COLLECTION_SELECT} WHERE c.id = $1 AND ($2::bigint IS NULL OR c.user_id = $2)"
    );
    let rows = client.query(&sql, &[&id, &scope.owner()]).await?;
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(attach_movies(client, rows).await?.pop())
}

/// Load the movies of every collection row in one query
async fn attach_movies(client: &LoggedClient, rows: Vec<Row>) -> Result<Vec<Collection>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.get("id")).collect();
    let movie_rows = client
        .query(
            "SELECT mc.collection_id, m.id, m.title, m.description, m.genres, m.uuid, \
                m.created_at, m.updated_at \
             FROM movie_collection mc JOIN movie m ON m.id = mc.movie_id \
             WHERE mc.collection_id = ANY($1) ORDER BY m.id",
            &[&ids],
        )
        .await?;

    let mut movies: HashMap<i64, Vec<Movie>> = HashMap::new();
    for row in &movie_rows {
        movies
            .entry(row.get("collection_id"))
            .or_default()
            .push(movie_from_row(row));
    }

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            collection_from_row(row, movies.remove(&id).unwrap_or_default())
        })
        .collect())
}

/// Insert unknown titles, then link every listed movie to the collection
async fn link_movies(
    tx: &LoggedTransaction<'_>,
    collection_id: i64,
    movies: &[MovieInput],
) -> Result<(), AppError> {
    if movies.is_empty() {
        return Ok(());
    }

    let titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
    let descriptions: Vec<&str> = movies.iter().map(|m| m.description.as_str()).collect();
    let genres: Vec<Option<&str>> = movies.iter().map(|m| m.genres.as_deref()).collect();

    tx.execute(
        "INSERT INTO movie (title, description, genres) \
         SELECT * FROM unnest($1::varchar[], $2::text[], $3::varchar[]) \
         ON CONFLICT (title) DO NOTHING",
        &[&titles, &descriptions, &genres],
    )
    .await?;

    let movie_ids: Vec<i64> = tx
        .query("SELECT id FROM movie WHERE title = ANY($1)", &[&titles])
        .await?
        .iter()
        .map(|row| row.get(0))
        .collect();

    tx.execute(
        "INSERT INTO movie_collection (collection_id, movie_id) SELECT $1, unnest($2::bigint[])",
        &[&collection_id, &movie_ids],
    )
    .await?;

    Ok(())
}

fn collection_from_row(row: &Row, movies: Vec<Movie>) -> Collection {
    Collection {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        collection_uuid: row.get("collection_uuid"),
        is_success: row.get("is_success"),
        user: User {
            id: row.get("u_id"),
            username: row.get("u_username"),
            email: row.get("u_email"),
            first_name: row.get("u_first_name"),
            last_name: row.get("u_last_name"),
            is_superuser: row.get("u_is_superuser"),
            is_staff: row.get("u_is_staff"),
            is_active: row.get("u_is_active"),
        },
        movies,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
