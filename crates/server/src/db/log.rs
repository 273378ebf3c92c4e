//! Per-request statement log and the client wrapper that feeds it

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool_postgres::{Object, Pool, PoolError, Transaction};
use movie_core::ExecutedStatement;
use parking_lot::Mutex;
use tokio_postgres::{Error, Row, types::ToSql};

/// Ordered log of statements executed while serving one request.
///
/// Cloning shares the underlying log. The tracking middleware creates one per
/// request and hands it to handlers through request extensions.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    statements: Arc<Mutex<Vec<ExecutedStatement>>>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.statements.lock().clear();
    }

    pub fn record(&self, sql: &str, duration: Duration) {
        self.statements
            .lock()
            .push(ExecutedStatement::new(sql, duration));
    }

    pub fn snapshot(&self) -> Vec<ExecutedStatement> {
        self.statements.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn logged<T>(
    log: &QueryLog,
    sql: &str,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    let started = Instant::now();
    let result = fut.await;
    log.record(sql, started.elapsed());
    result
}

/// Pooled connection that appends every statement to a [`QueryLog`]
pub struct LoggedClient {
    client: Object,
    log: QueryLog,
}

impl LoggedClient {
    pub async fn connect(pool: &Pool, log: &QueryLog) -> Result<Self, PoolError> {
        Ok(Self {
            client: pool.get().await?,
            log: log.clone(),
        })
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        logged(&self.log, sql, self.client.query(sql, params)).await
    }

    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, Error> {
        logged(&self.log, sql, self.client.query_one(sql, params)).await
    }

    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        logged(&self.log, sql, self.client.query_opt(sql, params)).await
    }

    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, Error> {
        logged(&self.log, sql, self.client.execute(sql, params)).await
    }

    /// Start a transaction; `BEGIN` is recorded like any other statement
    pub async fn transaction(&mut self) -> Result<LoggedTransaction<'_>, Error> {
        let Self { client, log } = self;
        let log: &QueryLog = log;
        let tx = logged(log, "BEGIN", client.transaction()).await?;
        Ok(LoggedTransaction { tx, log })
    }
}

/// Transaction counterpart of [`LoggedClient`]. Dropping without commit rolls back.
pub struct LoggedTransaction<'a> {
    tx: Transaction<'a>,
    log: &'a QueryLog,
}

impl LoggedTransaction<'_> {
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        logged(self.log, sql, self.tx.query(sql, params)).await
    }

    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, Error> {
        logged(self.log, sql, self.tx.query_one(sql, params)).await
    }

    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        logged(self.log, sql, self.tx.query_opt(sql, params)).await
    }

    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, Error> {
        logged(self.log, sql, self.tx.execute(sql, params)).await
    }

    pub async fn commit(self) -> Result<(), Error> {
        let log = self.log;
        logged(log, "COMMIT", self.tx.commit()).await
    }
}
