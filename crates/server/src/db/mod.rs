mod collections;
mod log;
mod movies;
mod users;

pub use collections::{CollectionOrdering, CollectionRepository, CollectionScope};
pub use log::{LoggedClient, LoggedTransaction, QueryLog};
pub use movies::MovieRepository;
pub use users::{UserChanges, UserRecord, UserRepository};

use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Create a connection pool from a database URL
pub async fn create_pool(database_url: &str) -> Result<Pool, deadpool_postgres::CreatePoolError> {
    let mut cfg = Config::new();
    cfg.url = Some(database_url.to_string());
    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
}

/// Create tables and indexes if they do not exist yet
pub async fn migrate(pool: &Pool) -> Result<(), crate::error::AppError> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("Database schema up to date");
    Ok(())
}
