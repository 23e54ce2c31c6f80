mod config;
mod db;
mod inertia;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::session::{MemorySessionStore, PgSessionStore, SessionStore, spawn_session_sweeper};
use services::user::{MemoryUserStore, PgUserStore, UserStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("invalid configuration");

    // Postgres when configured; otherwise sessions live only as long as the process.
    let (users, sessions): (Arc<dyn UserStore>, Arc<dyn SessionStore>) = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            (Arc::new(PgUserStore::new(pool.clone())), Arc::new(PgSessionStore::new(pool, config.session_ttl)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory user and session stores");
            let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
            let sessions = Arc::new(MemorySessionStore::new(users.clone(), config.session_ttl));
            (users, sessions)
        }
    };

    if config.dev_auth_bypass {
        tracing::warn!("DEV_AUTH_BYPASS enabled; POST /api/dev/session issues sessions without login");
    }

    let _sweeper = spawn_session_sweeper(sessions.clone(), config.session_sweep);

    let state = state::AppState::new(&config, users, sessions);
    tracing::info!(asset_version = state.inertia.version(), "inertia responder ready");
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "pagegate listening");
    axum::serve(listener, app).await.expect("server failed");
}
