//! Client for the external movie catalog API
//!
//! GET requests are retried on connection errors and on 500/502/503/504, up to
//! three retries with exponential backoff (0.5s, 1s, 2s). When retries run out
//! on an error status, the last upstream response is returned as is.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::config::CatalogConfig;

const MAX_RETRIES: u32 = 3;
const BACKOFF_FACTOR_SECS: f64 = 0.5;
const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog returned invalid JSON: {0}")]
    Decode(String),
}

/// Retrying client for the movie catalog
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Fetch the movie list, forwarding `query` verbatim
    pub async fn list_movies(
        &self,
        query: &[(String, String)],
    ) -> Result<(StatusCode, JsonValue), CatalogError> {
        let response = self.get_with_retry(query).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok((status, body))
    }

    async fn get_with_retry(
        &self,
        query: &[(String, String)],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut retry = 0;
        loop {
            let mut request = self.http.get(&self.url).query(query);
            if let Some(ref username) = self.username {
                request = request.basic_auth(username, self.password.as_ref());
            }

            match request.send().await {
                Ok(response) if retry < MAX_RETRIES && RETRY_STATUSES.contains(&response.status()) => {
                    tracing::warn!(status = %response.status(), retry = retry + 1, "Catalog error status, retrying");
                }
                Ok(response) => return Ok(response),
                Err(e) if retry < MAX_RETRIES && (e.is_connect() || e.is_timeout()) => {
                    tracing::warn!(error = %e, retry = retry + 1, "Catalog unreachable, retrying");
                }
                Err(e) => return Err(e),
            }

            retry += 1;
            tokio::time::sleep(backoff(retry)).await;
        }
    }
}

/// Delay before the `retry`-th retry (1-based)
fn backoff(retry: u32) -> Duration {
    Duration::from_secs_f64(BACKOFF_FACTOR_SECS * 2f64.powi(retry.saturating_sub(1) as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(2));
    }

    #[test]
    fn test_client_builds() {
        let client = CatalogClient::new(&CatalogConfig {
            url: "http://127.0.0.1:9/movies".to_string(),
            username: Some("user".to_string()),
            password: None,
        });
        assert!(client.is_ok());
    }
}
