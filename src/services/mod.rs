//! Collaborators the HTTP layer depends on.
//!
//! ARCHITECTURE
//! ============
//! Both stores are traits so `AppState` can carry either the in-memory or
//! the Postgres implementation. Route handlers never touch a pool directly.

pub mod session;
pub mod user;
