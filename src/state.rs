use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::session::{InMemorySessionStore, SessionStore};
use crate::config::AppConfig;
use crate::db;
use crate::memory::MemoryStore;
use crate::projects::repo::{PgProjectRepo, ProjectRepo};
use crate::test_runs::metrics::{provider_for, MetricsProvider};
use crate::test_runs::repo::{PgTestResultRepo, TestResultRepo};
use crate::users::repo::{PgUserRepo, UserRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub projects: Arc<dyn ProjectRepo>,
    pub test_results: Arc<dyn TestResultRepo>,
    pub sessions: Arc<dyn SessionStore>,
    pub metrics: Arc<dyn MetricsProvider>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let sessions = Arc::new(InMemorySessionStore::with_ttl_minutes(
            config.session.ttl_minutes,
        )) as Arc<dyn SessionStore>;
        let metrics = provider_for(config.metrics_provider);
        info!(provider = metrics.name(), "metrics provider selected");

        let Some(url) = config.database_url.clone() else {
            warn!("DATABASE_URL not set; data lives in memory and is lost on restart");
            return Ok(Self::in_memory(config, sessions, metrics));
        };

        let db = db::connect(&config, &url).await?;
        db::migrate(&db).await?;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserRepo::new(db.clone())),
            Arc::new(PgProjectRepo::new(db.clone())),
            Arc::new(PgTestResultRepo::new(db)),
            sessions,
            metrics,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        projects: Arc<dyn ProjectRepo>,
        test_results: Arc<dyn TestResultRepo>,
        sessions: Arc<dyn SessionStore>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        Self {
            config,
            users,
            projects,
            test_results,
            sessions,
            metrics,
        }
    }

    /// Every repository backed by one shared `MemoryStore`.
    pub fn in_memory(
        config: Arc<AppConfig>,
        sessions: Arc<dyn SessionStore>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(
            config,
            store.clone(),
            store.clone(),
            store,
            sessions,
            metrics,
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_metrics(Arc::new(crate::test_runs::metrics::SimulatedMetrics))
    }

    #[cfg(test)]
    pub fn fake_with_metrics(metrics: Arc<dyn MetricsProvider>) -> Self {
        let config = AppConfig::from_lookup(|_| None).expect("default config");
        let sessions = Arc::new(InMemorySessionStore::with_ttl_minutes(5));
        Self::in_memory(Arc::new(config), sessions, metrics)
    }
}
