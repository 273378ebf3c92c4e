//! HTTP middleware

pub mod auth;
pub mod metrics;

pub use auth::{JwtAuth, auth_middleware};
pub use metrics::metrics_middleware;
