//! Tracking record persistence

use async_trait::async_trait;
use deadpool_postgres::Pool;
use movie_core::{QueryCount, StoredTrackingRecord, TrackingRecord};
use tokio_postgres::Row;

use super::TrackingError;

/// Destination for tracking records, plus the reporting operations
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn insert(&self, record: &TrackingRecord) -> Result<(), TrackingError>;

    async fn count(&self) -> Result<u64, TrackingError>;

    /// Delete every record, returning how many were removed
    async fn reset(&self) -> Result<u64, TrackingError>;

    async fn list(&self) -> Result<Vec<StoredTrackingRecord>, TrackingError>;
}

/// Postgres-backed store writing to `requests_tracking`
#[derive(Clone)]
pub struct PgTrackingStore {
    pool: Pool,
}

impl PgTrackingStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    async fn insert(&self, record: &TrackingRecord) -> Result<(), TrackingError> {
        let client = self.pool.get().await?;
        let query_count = serde_json::to_value(record.query_count)
            .map_err(|e| TrackingError::Persist(format!("Unserializable query count: {}", e)))?;
        let execution_secs = record.execution_time.as_secs_f64();

        client
            .execute(
                "INSERT INTO requests_tracking (\
                    request_id, user_id, method, path, ip_address, client, cookies, query_params, \
                    headers, body, response_status, response_data, execution_time, request_time, \
                    request_date, query_count, node_id, request_type\
                 ) VALUES (\
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
                    make_interval(secs => $13), $14::text::timestamp, $15, $16, $17, $18\
                 )",
                &[
                    &record.request_id,
                    &record.user_id,
                    &record.method,
                    &record.path,
                    &record.ip_address,
                    &record.client,
                    &record.cookies,
                    &record.query_params,
                    &record.headers,
                    &record.body,
                    &record.response_status,
                    &record.response_data,
                    &execution_secs,
                    &record.request_time,
                    &record.request_date,
                    &query_count,
                    &record.node_id,
                    &record.request_type,
                ],
            )
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, TrackingError> {
        let client = self.pool.get().await?;
        let count: i64 = client
            .query_one("SELECT COUNT(*) FROM requests_tracking", &[])
            .await?
            .get(0);
        Ok(count.max(0) as u64)
    }

    async fn reset(&self) -> Result<u64, TrackingError> {
        let client = self.pool.get().await?;
        Ok(client.execute("DELETE FROM requests_tracking", &[]).await?)
    }

    async fn list(&self) -> Result<Vec<StoredTrackingRecord>, TrackingError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, request_id, COALESCE(user_id, 0) AS user_id, method, path, ip_address, \
                    client, cookies, query_params, headers, COALESCE(body, '') AS body, \
                    COALESCE(response_status, '') AS response_status, \
                    COALESCE(response_data, '') AS response_data, \
                    COALESCE(EXTRACT(EPOCH FROM execution_time)::float8, 0) AS execution_secs, \
                    to_char(request_time, 'YYYY-MM-DD HH24:MI:SS') AS request_time, \
                    COALESCE(request_date, request_time::date) AS request_date, \
                    query_count, COALESCE(node_id, '') AS node_id, \
                    COALESCE(request_type, '') AS request_type, created_at, updated_at \
                 FROM requests_tracking ORDER BY id",
                &[],
            )
            .await?;
        rows.iter().map(stored_from_row).collect()
    }
}

fn stored_from_row(row: &Row) -> Result<StoredTrackingRecord, TrackingError> {
    let query_count: Option<serde_json::Value> = row.get("query_count");
    let query_count: QueryCount = match query_count {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| TrackingError::Persist(format!("Malformed stored query count: {}", e)))?,
        None => QueryCount::default(),
    };
    let execution_secs: f64 = row.get("execution_secs");

    Ok(StoredTrackingRecord {
        id: row.get("id"),
        record: TrackingRecord {
            request_id: row.get("request_id"),
            user_id: row.get("user_id"),
            method: row.get("method"),
            path: row.get("path"),
            ip_address: row.get("ip_address"),
            client: row.get("client"),
            cookies: json_or_null(row, "cookies"),
            query_params: json_or_null(row, "query_params"),
            headers: json_or_null(row, "headers"),
            body: row.get("body"),
            response_status: row.get("response_status"),
            response_data: row.get("response_data"),
            execution_time: std::time::Duration::from_secs_f64(execution_secs.max(0.0)),
            request_time: row.get("request_time"),
            request_date: row.get("request_date"),
            query_count,
            node_id: row.get("node_id"),
            request_type: row.get("request_type"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn json_or_null(row: &Row, column: &str) -> serde_json::Value {
    row.get::<_, Option<serde_json::Value>>(column)
        .unwrap_or(serde_json::Value::Null)
}
