//! Page routes. Each handler picks a component and its props; the
//! Inertia responder decides between the HTML shell and JSON.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::auth::{AuthUser, MaybeUser};
use crate::inertia::registry::{LOGIN_PAGE, TEST_PAGE, WELCOME_PAGE};
use crate::inertia::{InertiaRequest, Props};
use crate::services::user::User;
use crate::state::AppState;

/// Props every page receives.
pub(crate) fn shared_props(user: Option<&User>) -> Props {
    let mut props = Props::new();
    props.insert("auth".to_owned(), json!({ "user": user }));
    props
}

fn render(state: &AppState, inertia: &InertiaRequest, component: &str, props: Props) -> Response {
    match state.inertia.render(inertia, component, props) {
        Ok(page) => state.inertia.respond(inertia, page),
        Err(e) => {
            tracing::error!(error = %e, component, "page render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /`: public landing page.
pub async fn welcome(State(state): State<AppState>, inertia: InertiaRequest, MaybeUser(user): MaybeUser) -> Response {
    render(&state, &inertia, WELCOME_PAGE, shared_props(user.as_ref()))
}

/// `GET /login`: redirect target for guests.
pub async fn login(State(state): State<AppState>, inertia: InertiaRequest, MaybeUser(user): MaybeUser) -> Response {
    render(&state, &inertia, LOGIN_PAGE, shared_props(user.as_ref()))
}

/// `GET /test`: protected page rendering `test2`.
pub async fn test_page(State(state): State<AppState>, inertia: InertiaRequest, auth: AuthUser) -> Response {
    render(&state, &inertia, TEST_PAGE, shared_props(Some(&auth.user)))
}
