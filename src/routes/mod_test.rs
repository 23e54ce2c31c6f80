//! End-to-end route tests: the full router driven in-process.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use serde_json::Value;
use tower::ServiceExt;

use super::*;
use crate::config::Config;
use crate::inertia::{X_INERTIA, X_INERTIA_VERSION};
use crate::services::session::{MemorySessionStore, SessionError, SessionStore, generate_token};
use crate::services::user::{MemoryUserStore, NewUser, User, UserStore};
use crate::state::test_helpers::{acting_as, test_app_state, test_app_state_with};

fn get_request(path: &str, token: Option<&str>, inertia: bool) -> Request<Body> {
    let mut builder = Request::get(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session_token={token}"));
    }
    if inertia {
        builder = builder.header(X_INERTIA, "true").header(X_INERTIA_VERSION, "1");
    }
    builder.body(Body::empty()).unwrap()
}

fn post_request(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session_token={token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(state: &AppState, request: Request<Body>) -> Response<Body> {
    app(state.clone()).oneshot(request).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response<Body>) -> Option<&str> {
    response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
}

fn set_cookie_token(response: &Response<Body>) -> Option<String> {
    let raw = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = raw.split(';').next()?;
    pair.strip_prefix("session_token=").map(str::to_owned)
}

/// Session store whose backend is unreachable.
struct UnavailableSessions;

#[async_trait]
impl SessionStore for UnavailableSessions {
    async fn create_session(&self, _user_id: uuid::Uuid) -> Result<String, SessionError> {
        Err(SessionError::Db(sqlx::Error::PoolTimedOut))
    }

    async fn validate_session(&self, _token: &str) -> Result<Option<User>, SessionError> {
        Err(SessionError::Db(sqlx::Error::PoolTimedOut))
    }

    async fn delete_session(&self, _token: &str) -> Result<(), SessionError> {
        Err(SessionError::Db(sqlx::Error::PoolTimedOut))
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        Err(SessionError::Db(sqlx::Error::PoolTimedOut))
    }
}

fn unavailable_sessions_state() -> AppState {
    let config = Config::from_lookup(|_| None).unwrap();
    AppState::new(&config, Arc::new(MemoryUserStore::new()), Arc::new(UnavailableSessions))
}

// =============================================================================
// GET /test, authenticated
// =============================================================================

#[tokio::test]
async fn logged_in_user_sees_test2_component() {
    let state = test_app_state();
    let (user, token) = acting_as(&state).await;

    let response = send(&state, get_request("/test", Some(&token), true)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["component"], "test2");
    assert_eq!(page["url"], "/test");
    assert_eq!(page["props"]["auth"]["user"]["id"], user.id.to_string());
}

#[tokio::test]
async fn logged_in_first_visit_gets_shell_for_test2() {
    let state = test_app_state();
    let (_, token) = acting_as(&state).await;

    let response = send(&state, get_request("/test", Some(&token), false)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = text_body(response).await;
    assert!(html.contains("data-page=\"{&quot;component&quot;:&quot;test2&quot;"));
}

#[tokio::test]
async fn repeated_authenticated_requests_are_identical() {
    let state = test_app_state();
    let (_, token) = acting_as(&state).await;

    for _ in 0..3 {
        let response = send(&state, get_request("/test", Some(&token), true)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["component"], "test2");
    }
}

// =============================================================================
// GET /test, unauthenticated
// =============================================================================

#[tokio::test]
async fn guest_is_redirected_to_login() {
    let state = test_app_state();

    let response = send(&state, get_request("/test", None, false)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn guest_inertia_visit_is_redirected_to_login() {
    let state = test_app_state();

    let response = send(&state, get_request("/test", None, true)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn repeated_guest_requests_redirect_identically() {
    let state = test_app_state();
    for _ in 0..3 {
        let response = send(&state, get_request("/test", None, false)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), Some("/login"));
    }
}

#[tokio::test]
async fn forged_token_is_redirected_to_login() {
    let state = test_app_state();
    acting_as(&state).await;

    let response = send(&state, get_request("/test", Some("deadbeef"), false)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn expired_session_is_redirected_to_login() {
    let config = Config::from_lookup(|_| None).unwrap();
    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let sessions = Arc::new(MemorySessionStore::new(users.clone(), time::Duration::seconds(-1)));
    let state = AppState::new(&config, users, sessions);
    let user = state.users.create_user(NewUser::fake()).await.unwrap();
    let token = state.sessions.create_session(user.id).await.unwrap();

    let response = send(&state, get_request("/test", Some(&token), false)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

// =============================================================================
// Session store failures
// =============================================================================

#[tokio::test]
async fn store_failure_on_protected_page_is_server_error() {
    let state = unavailable_sessions_state();

    let response = send(&state, get_request("/test", Some(&generate_token()), true)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn guest_without_cookie_is_redirected_even_when_store_is_down() {
    let state = unavailable_sessions_state();

    let response = send(&state, get_request("/test", None, false)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn store_failure_on_public_page_renders_as_guest() {
    let state = unavailable_sessions_state();

    let response = send(&state, get_request("/login", Some(&generate_token()), true)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["component"], "Auth/Login");
    assert!(page["props"]["auth"]["user"].is_null());
}

// =============================================================================
// Public pages
// =============================================================================

#[tokio::test]
async fn login_page_renders_for_guest() {
    let state = test_app_state();

    let response = send(&state, get_request("/login", None, true)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["component"], "Auth/Login");
    assert!(page["props"]["auth"]["user"].is_null());
}

#[tokio::test]
async fn welcome_page_shares_identity_when_logged_in() {
    let state = test_app_state();
    let (user, token) = acting_as(&state).await;

    let response = send(&state, get_request("/", Some(&token), true)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["component"], "Welcome");
    assert_eq!(page["props"]["auth"]["user"]["email"], user.email);
}

#[tokio::test]
async fn healthz_is_ok() {
    let state = test_app_state();
    let response = send(&state, get_request("/healthz", None, false)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn logout_ends_the_session() {
    let state = test_app_state();
    let (_, token) = acting_as(&state).await;

    let response = send(&state, post_request("/logout", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(set_cookie_token(&response).as_deref(), Some(""));

    let response = send(&state, get_request("/test", Some(&token), false)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn logout_without_session_redirects_to_login() {
    let state = test_app_state();
    let response = send(&state, post_request("/logout", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), Some("/login"));
}

// =============================================================================
// Dev session bootstrap
// =============================================================================

#[tokio::test]
async fn dev_session_is_hidden_by_default() {
    let state = test_app_state();
    let response = send(&state, post_request("/api/dev/session", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dev_session_cookie_unlocks_test_page() {
    let state = test_app_state_with(|key| (key == "DEV_AUTH_BYPASS").then(|| "true".to_owned()));

    let response = send(&state, post_request("/api/dev/session", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = set_cookie_token(&response).expect("session cookie should be set");
    let body = json_body(response).await;
    assert!(body["user"]["id"].is_string());

    let response = send(&state, get_request("/test", Some(&token), true)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["component"], "test2");
}
