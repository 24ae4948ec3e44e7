use anyhow::Context;
use serde::Deserialize;

const DEFAULT_SESSION_TTL_MINUTES: i64 = 60 * 24 * 30;
/// One year.
const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_minutes: i64,
    pub secure_cookie: bool,
}

/// Which `MetricsProvider` backs test runs.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsProviderKind {
    Simulated,
    Fixed,
}

impl std::str::FromStr for MetricsProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "fixed" => Ok(Self::Fixed),
            other => anyhow::bail!("unknown METRICS_PROVIDER {other:?} (expected simulated|fixed)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub name: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Echo server error details to clients (APP_ENV=development).
    pub expose_error_details: bool,
    pub session: SessionConfig,
    pub cors_origin: Option<String>,
    pub metrics_provider: MetricsProviderKind,
    /// Lowercased project status labels counted as active on the dashboard.
    pub active_statuses: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let ttl_minutes = match non_empty("SESSION_TTL_MINUTES") {
            None => DEFAULT_SESSION_TTL_MINUTES,
            Some(v) => {
                let minutes: i64 = v
                    .trim()
                    .parse()
                    .with_context(|| format!("SESSION_TTL_MINUTES {v:?} is not a number"))?;
                if !(1..=MAX_SESSION_TTL_MINUTES).contains(&minutes) {
                    anyhow::bail!(
                        "SESSION_TTL_MINUTES {minutes} out of range (1..={MAX_SESSION_TTL_MINUTES})"
                    );
                }
                minutes
            }
        };

        let session = SessionConfig {
            cookie_name: non_empty("SESSION_COOKIE").unwrap_or_else(|| "sid".into()),
            ttl_minutes,
            secure_cookie: non_empty("SESSION_COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        let metrics_provider = match non_empty("METRICS_PROVIDER") {
            Some(v) => v.parse()?,
            None => MetricsProviderKind::Simulated,
        };

        let active_statuses = non_empty("ACTIVE_STATUSES")
            .unwrap_or_else(|| "activo,active,en progreso,in progress".into())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let bootstrap_admin = match (non_empty("ADMIN_USERNAME"), non_empty("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin {
                name: non_empty("ADMIN_NAME").unwrap_or_else(|| "Administrator".into()),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            host: non_empty("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: match non_empty("APP_PORT") {
                Some(v) => v.parse()?,
                None => 5000,
            },
            expose_error_details: non_empty("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
            session,
            cors_origin: non_empty("CORS_ORIGIN"),
            metrics_provider,
            active_statuses,
            bootstrap_admin,
        })
    }
}
