mod app;
mod auth;
mod config;
mod dashboard;
mod db;
mod error;
mod extract;
mod memory;
mod projects;
mod state;
mod test_runs;
mod users;

use crate::config::AppConfig;
use crate::state::AppState;

const SESSION_SWEEP_EVERY: std::time::Duration = std::time::Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "projtrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    error::expose_error_details(config.expose_error_details);

    let state = AppState::init(config).await?;
    auth::session::spawn_sweeper(state.sessions.clone(), SESSION_SWEEP_EVERY);

    if let Some(admin) = state.config.bootstrap_admin.clone() {
        if users::services::ensure_bootstrap_admin(state.users.as_ref(), &admin).await? {
            tracing::info!(username = %admin.username, "admin account ready");
        }
    }

    let config = state.config.clone();
    let app = app::build_app(state)?;
    app::serve(app, &config).await
}
