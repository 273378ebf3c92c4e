use thiserror::Error;

/// Failures inside the tracking subsystem.
///
/// None of these reach the client. The middleware logs them and moves on.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Reading or stringifying the response body failed
    #[error("Response capture failed: {0}")]
    Capture(String),

    /// The request context could not be turned into a record
    #[error("Tracking record build failed: {0}")]
    Build(String),

    /// The store rejected the write or is unavailable
    #[error("Tracking record persistence failed: {0}")]
    Persist(String),
}

impl From<deadpool_postgres::PoolError> for TrackingError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        TrackingError::Persist(format!("Database pool error: {}", err))
    }
}

impl From<tokio_postgres::Error> for TrackingError {
    fn from(err: tokio_postgres::Error) -> Self {
        TrackingError::Persist(format!("Database error: {}", err))
    }
}
