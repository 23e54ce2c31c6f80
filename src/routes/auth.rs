//! Auth gate: resolves the session cookie and redirects guests to login.

use axum::extract::{FromRef, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::inertia::{InertiaRequest, PageResponse};
use crate::services::session::{SessionError, SessionStore};
use crate::services::user::{NewUser, User};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/login";

/// Authenticated identity attached to a request by the gate.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Gate decision for one request.
#[derive(Debug)]
pub enum Access {
    Granted(AuthUser),
    Denied,
}

/// Non-empty session token from the cookie jar, if any.
pub(crate) fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(COOKIE_NAME).map(Cookie::value).filter(|t| !t.is_empty())
}

/// Decide whether `token` identifies a live session.
///
/// # Errors
///
/// Only store failures are errors; a missing or stale token is `Access::Denied`.
pub async fn authorize(sessions: &dyn SessionStore, token: Option<&str>) -> Result<Access, SessionError> {
    let Some(token) = token else {
        return Ok(Access::Denied);
    };

    Ok(match sessions.validate_session(token).await? {
        Some(user) => Access::Granted(AuthUser { user, token: token.to_owned() }),
        None => Access::Denied,
    })
}

/// Resolve the request's identity or produce the response that replaces the handler.
async fn admit(state: &AppState, jar: &CookieJar, inertia: &InertiaRequest) -> Result<AuthUser, Response> {
    match authorize(state.sessions.as_ref(), session_token(jar)).await {
        Ok(Access::Granted(auth)) => Ok(auth),
        Ok(Access::Denied) => {
            tracing::debug!(url = %inertia.url, "unauthenticated request redirected to login");
            Err(state.inertia.respond(inertia, PageResponse::redirect(LOGIN_PATH)))
        }
        Err(e) => {
            tracing::error!(error = %e, "session validation failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn cleared_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Route layer for protected routes: forward with `AuthUser` attached, or redirect to login.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    inertia: InertiaRequest,
    mut request: Request,
    next: Next,
) -> Response {
    match admit(&state, &jar, &inertia).await {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(response) => response,
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthUser>() {
            return Ok(auth.clone());
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        admit(&app_state, &jar, &InertiaRequest::from_parts(parts)).await
    }
}

/// Identity for public pages; `None` for guests.
pub struct MaybeUser(pub Option<User>);

impl<S> axum::extract::FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthUser>() {
            return Ok(Self(Some(auth.user.clone())));
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        match authorize(app_state.sessions.as_ref(), session_token(&jar)).await {
            Ok(Access::Granted(auth)) => Ok(Self(Some(auth.user))),
            Ok(Access::Denied) => Ok(Self(None)),
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed; treating visitor as guest");
                Ok(Self(None))
            }
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /logout`: end the session and send the visitor to login.
pub async fn logout(State(state): State<AppState>, inertia: InertiaRequest, auth: AuthUser) -> Response {
    if let Err(e) = state.sessions.delete_session(&auth.token).await {
        tracing::error!(error = %e, user_id = %auth.user.id, "session delete failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    tracing::info!(user_id = %auth.user.id, "user logged out");
    let jar = CookieJar::new().add(cleared_session_cookie(state.cookie_secure));
    (jar, state.inertia.respond(&inertia, PageResponse::redirect(LOGIN_PATH))).into_response()
}

/// `POST /api/dev/session`: create a factory user and log them in.
///
/// Enabled only when `DEV_AUTH_BYPASS=true`.
pub async fn dev_session(State(state): State<AppState>) -> Response {
    if !state.dev_auth_bypass {
        return StatusCode::NOT_FOUND.into_response();
    }

    let user = match state.users.create_user(NewUser::fake()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "dev user creation failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let token = match state.sessions.create_session(user.id).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "dev session creation failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    tracing::warn!(user_id = %user.id, "session issued via dev auth bypass");
    let jar = CookieJar::new().add(session_cookie(token, state.cookie_secure));
    (jar, Json(serde_json::json!({ "user": user }))).into_response()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
