//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the auth gate via the
//! `State` extractor. Session and user storage are trait objects so the
//! same router runs on Postgres in production and in memory under test.

use std::sync::Arc;

use crate::config::Config;
use crate::inertia::{ComponentRegistry, Inertia};
use crate::services::session::SessionStore;
use crate::services::user::UserStore;

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub inertia: Inertia,
    pub cookie_secure: bool,
    pub dev_auth_bypass: bool,
}

impl AppState {
    #[must_use]
    pub fn new(config: &Config, users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            users,
            inertia: Inertia::new(config.asset_version.clone(), config.app_name.clone(), ComponentRegistry::default()),
            cookie_secure: config.cookie_secure,
            dev_auth_bypass: config.dev_auth_bypass,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
