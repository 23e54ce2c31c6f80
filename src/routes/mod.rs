//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Public pages and the login target are open. Protected routes sit behind
//! the `require_auth` route layer, which redirects guests to `/login`
//! before any handler runs.

pub mod auth;
pub mod pages;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/test", get(pages::test_page))
        .route("/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/", get(pages::welcome))
        .route(auth::LOGIN_PATH, get(pages::login))
        .route("/api/dev/session", post(auth::dev_session))
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
