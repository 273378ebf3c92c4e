pub mod collections;
pub mod movies;
pub mod register;
pub mod requests;
pub mod system;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};
use deadpool_postgres::Pool;

/// Settings shared with handlers through an extension
#[derive(Debug, Clone, Copy)]
pub struct ApiSettings {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

/// Registration and token routes (public)
pub fn register_routes() -> Router<Pool> {
    Router::new()
        .route("/register", post(register::register))
        .route("/register/generate_token", post(register::generate_token))
}

/// Routes that answer 401 without a valid access token
pub fn api_routes() -> Router<Pool> {
    Router::new()
        .route("/user", get(users::list).post(users::create))
        .route("/user/{id}", get(users::read).put(users::update).patch(users::update))
        .route("/movies", get(movies::catalog))
        .route("/db/movies", get(movies::list).post(movies::create))
        .route(
            "/db/movies/{id}",
            get(movies::read).put(movies::replace).patch(movies::update),
        )
        .route("/collection", get(collections::list).post(collections::create))
        .route(
            "/collection/{id}",
            get(collections::read)
                .put(collections::replace)
                .patch(collections::update)
                .delete(collections::delete),
        )
        .route("/request-count", get(requests::count))
        .route("/request-count/reset", post(requests::reset))
        .route("/request-count/request-log", get(requests::request_log))
}
