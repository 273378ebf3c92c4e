//! Server configuration

use std::str::FromStr;

use axum::http::HeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NODE_ID {0:?} is not a valid header value")]
    InvalidNodeId(String),
}

/// Server configuration loaded from environment variables
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub cors_origins: Vec<String>,
    pub tracking: TrackingConfig,
    pub jwt_secret: String,
    pub jwt_access_ttl_secs: u64,
    pub jwt_refresh_ttl_secs: u64,
    pub movie_api: Option<CatalogConfig>,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

/// Settings consumed by the request-tracking middleware.
///
/// The node id is validated on construction, so the response header and the
/// stored `node_id` always carry the same value.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    environment: String,
    node_id: String,
    node_header: HeaderValue,
}

impl TrackingConfig {
    /// Environments in which tracking records are written
    pub const PERSISTING_ENVIRONMENTS: [&'static str; 3] = ["DEV", "PROD", "LOCAL"];

    pub fn new(
        environment: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let node_id = node_id.into();
        let node_header = HeaderValue::from_str(&node_id)
            .map_err(|_| ConfigError::InvalidNodeId(node_id.clone()))?;
        Ok(Self {
            environment: environment.into(),
            node_id,
            node_header,
        })
    }

    /// Deployment tag, e.g. `DEV`
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Identifier of this process, echoed in `processor_node_id`
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn node_header(&self) -> &HeaderValue {
        &self.node_header
    }

    pub fn persists(&self) -> bool {
        Self::PERSISTING_ENVIRONMENTS.contains(&self.environment.as_str())
    }
}

/// External movie catalog endpoint
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "host=localhost user=postgres dbname=movies".into()),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            tracking: TrackingConfig::new(
                std::env::var("ENVIRONMENT").unwrap_or_default(),
                std::env::var("NODE_ID").unwrap_or_else(|_| "node-0".into()),
            )?,
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "insecure-dev-secret".into()),
            jwt_access_ttl_secs: parse_env("JWT_ACCESS_TTL_SECS", 300),
            jwt_refresh_ttl_secs: parse_env("JWT_REFRESH_TTL_SECS", 86_400),
            movie_api: std::env::var("MOVIE_API_URL").ok().map(|url| CatalogConfig {
                url,
                username: std::env::var("MOVIE_API_USERNAME").ok(),
                password: std::env::var("MOVIE_API_PASSWORD").ok(),
            }),
            default_page_size: parse_env("DEFAULT_PAGE_SIZE", 10),
            max_page_size: parse_env("MAX_PAGE_SIZE", 100),
        })
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
