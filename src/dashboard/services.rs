use serde::Serialize;

use crate::{
    error::ApiError,
    projects::repo::ProjectRepo,
    test_runs::{repo::TestResultRepo, repo_types::TestResult},
};

pub const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_projects: i64,
    pub total_tests: i64,
    /// Percent of SUCCESS results, 0 with no results.
    pub success_rate: f64,
    pub recent_activity: Vec<TestResult>,
}

pub fn success_rate(success: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    success as f64 / total as f64 * 100.0
}

pub async fn stats(
    projects: &dyn ProjectRepo,
    results: &dyn TestResultRepo,
    active_statuses: &[String],
) -> Result<DashboardStats, ApiError> {
    let active_projects = projects.count_projects_with_status(active_statuses).await?;
    let counts = results.result_counts().await?;
    let recent_activity = results.recent_results(RECENT_LIMIT).await?;

    Ok(DashboardStats {
        active_projects,
        total_tests: counts.total,
        success_rate: success_rate(counts.success, counts.total),
        recent_activity,
    })
}
