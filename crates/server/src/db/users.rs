use deadpool_postgres::Pool;
use movie_core::User;
use tokio_postgres::Row;

use super::log::{LoggedClient, QueryLog};
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, is_superuser, is_staff, is_active";

/// Fields written on user creation, password already hashed
pub struct UserRecord<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Field changes for an update, password already hashed
#[derive(Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
}

/// Repository for user accounts
#[derive(Clone)]
pub struct UserRepository {
    pool: Pool,
    log: QueryLog,
}

impl UserRepository {
    pub fn new(pool: Pool, log: QueryLog) -> Self {
        Self { pool, log }
    }

    pub async fn create(&self, user: UserRecord<'_>) -> Result<User, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!(
            "INSERT INTO users (username, password, email, first_name, last_name, is_superuser, is_staff, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &user.username,
                    &user.password_hash,
                    &user.email,
                    &user.first_name,
                    &user.last_name,
                    &user.is_superuser,
                    &user.is_staff,
                    &user.is_active,
                ],
            )
            .await?;
        Ok(user_from_row(&row))
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Look up a user and its password hash for login
    pub async fn find_credentials(&self, username: &str) -> Result<Option<(User, String)>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!("SELECT {USER_COLUMNS}, password FROM users WHERE username = $1");
        let row = client.query_opt(&sql, &[&username]).await?;
        Ok(row.map(|row| (user_from_row(&row), row.get("password"))))
    }

    /// List users; `only` restricts the result to a single id
    pub async fn list(&self, only: Option<i64>) -> Result<Vec<User>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE ($1::bigint IS NULL OR id = $1) ORDER BY id"
        );
        let rows = client.query(&sql, &[&only]).await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, AppError> {
        let client = LoggedClient::connect(&self.pool, &self.log).await?;
        let sql = format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                password = COALESCE($3, password), \
                email = COALESCE($4, email), \
                first_name = COALESCE($5, first_name), \
                last_name = COALESCE($6, last_name), \
                is_superuser = COALESCE($7, is_superuser), \
                is_staff = COALESCE($8, is_staff), \
                is_active = COALESCE($9, is_active) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = client
            .query_opt(
                &sql,
                &[
                    &id,
                    &changes.username,
                    &changes.password_hash,
                    &changes.email,
                    &changes.first_name,
                    &changes.last_name,
                    &changes.is_superuser,
                    &changes.is_staff,
                    &changes.is_active,
                ],
            )
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }
}

pub(crate) fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        is_superuser: row.get("is_superuser"),
        is_staff: row.get("is_staff"),
        is_active: row.get("is_active"),
    }
}
