//! Contains all the routes that this application can handle.

mod api;
mod home;

// re-export errors
pub use api::subscribe::SubscribeError;

use crate::AppState;
use home::home;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

/// Anything we don't serve, including a known path with the wrong method.
async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// All the routes of the server
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        // `get` also answers HEAD unless the HEAD slot is taken.
        .route("/", get(home).head(not_found).fallback(not_found))
        .with_state(app_state.clone())
        .nest("/api", api_routes(app_state))
        .fallback(not_found)
}

/// API - Routes nested under "/api" path
fn api_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/subscribe", post(api::subscribe).fallback(not_found))
        .with_state(app_state)
}
