//! movie-core: Shared domain types for the movie collection service
//!
//! This crate holds the request-tracking record, SQL statement
//! classification, request timing, and the user/movie/collection models.
//! It has no HTTP or database dependency.

pub mod error;
pub mod models;
pub mod page;
pub mod query_counter;
pub mod timer;
pub mod tracking;

pub use error::{CoreError, ErrorBody};
pub use models::{
    Collection, CollectionInput, Credentials, Movie, MovieInput, MovieUpdate, NewUser, User,
    UserUpdate,
};
pub use page::{Page, PageInfo, PageLinks, PageRequest};
pub use query_counter::{ExecutedStatement, QueryCounter};
pub use timer::RequestTimer;
pub use tracking::{
    ANONYMOUS_USER_ID, LARGE_CONTENT_PLACEHOLDER, QueryCount, REQUEST_TYPE_INCOMING, SqlVerb,
    StoredTrackingRecord, TrackingRecord, format_request_time,
};
