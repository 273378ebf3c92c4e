//! Per-request tracking: timing, SQL verb counts, and a persisted audit record

pub mod builder;
pub mod capture;
mod error;
pub mod middleware;
mod store;

pub use builder::{Exchange, RequestSnapshot, build_record};
pub use capture::{BodyFailure, Capture, buffer_body, capture_policy, capture_response};
pub use error::TrackingError;
pub use middleware::{NODE_ID_HEADER, RequestId, Tracker, tracking_middleware};
pub use store::{PgTrackingStore, TrackingStore};
