//! Client-side component registry.
//!
//! The server may only name components the bundled front-end can resolve;
//! anything else would leave the client with a blank page.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::PageError;

pub const WELCOME_PAGE: &str = "Welcome";
pub const LOGIN_PAGE: &str = "Auth/Login";
pub const TEST_PAGE: &str = "test2";

/// Components shipped with the front-end bundle.
pub const APP_COMPONENTS: &[&str] = &[WELCOME_PAGE, LOGIN_PAGE, TEST_PAGE];

#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    names: Arc<BTreeSet<String>>,
}

impl ComponentRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: Arc::new(names.into_iter().map(Into::into).collect()) }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Check that `name` is non-empty and registered.
    ///
    /// # Errors
    ///
    /// `EmptyComponent` or `UnknownComponent`.
    pub fn resolve(&self, name: &str) -> Result<(), PageError> {
        if name.trim().is_empty() {
            return Err(PageError::EmptyComponent);
        }
        if !self.contains(name) {
            return Err(PageError::UnknownComponent(name.to_owned()));
        }
        Ok(())
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(APP_COMPONENTS.iter().copied())
    }
}
