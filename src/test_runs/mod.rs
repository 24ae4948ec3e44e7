use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod metrics;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::test_routes()
}
