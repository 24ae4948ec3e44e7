use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    projects::{repo::ProjectRepo, services::get_project},
    test_runs::{
        metrics::{Analysis, MetricsProvider},
        repo::TestResultRepo,
        repo_types::{NewTestResult, TestResult, TestStatus},
    },
};

fn analysis_row(project_id: i64, analysis: Analysis) -> anyhow::Result<NewTestResult> {
    Ok(NewTestResult {
        project_id,
        status: analysis.verdict(),
        code_quality: Some(serde_json::to_value(&analysis.code_quality)?),
        security_issues: Some(serde_json::to_value(&analysis.security)?),
        performance_metrics: Some(serde_json::to_value(&analysis.performance)?),
        test_summary: Some(serde_json::to_value(&analysis.tests)?),
        commit_info: Some(serde_json::to_value(&analysis.commit)?),
        execution_logs: Some(analysis.logs),
    })
}

fn error_row(project_id: i64, cause: &anyhow::Error) -> NewTestResult {
    NewTestResult {
        project_id,
        status: TestStatus::Error,
        code_quality: None,
        security_issues: None,
        performance_metrics: None,
        test_summary: None,
        commit_info: None,
        execution_logs: Some(format!("Analysis failed: {cause:#}")),
    }
}

/// Analyses a project and records exactly one result row for it.
pub async fn run_for_project(
    projects: &dyn ProjectRepo,
    results: &dyn TestResultRepo,
    metrics: &dyn MetricsProvider,
    project_uuid: Uuid,
) -> Result<TestResult, ApiError> {
    let project = get_project(projects, project_uuid).await?;

    if metrics.requires_repository() && project.repository_url.is_none() {
        warn!(project = %project.uuid, provider = metrics.name(), "run without repository URL");
        return Err(ApiError::validation(
            "Project has no repository URL to analyse",
        ));
    }

    let row = match metrics.analyze(&project).await {
        Ok(analysis) => analysis_row(project.id, analysis)?,
        Err(e) => {
            error!(project = %project.uuid, provider = metrics.name(), error = %e, "analysis failed");
            error_row(project.id, &e)
        }
    };

    let result = results.insert_result(row).await?;
    info!(
        project = %project.uuid,
        result = %result.uuid,
        status = ?result.status,
        "test run recorded"
    );
    Ok(result)
}

pub async fn history(
    projects: &dyn ProjectRepo,
    results: &dyn TestResultRepo,
    project_uuid: Uuid,
) -> Result<Vec<TestResult>, ApiError> {
    let project = get_project(projects, project_uuid).await?;
    Ok(results.results_for_project(project.id).await?)
}

pub async fn all_results(results: &dyn TestResultRepo) -> Result<Vec<TestResult>, ApiError> {
    Ok(results.all_results().await?)
}
