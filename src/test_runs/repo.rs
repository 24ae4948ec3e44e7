use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::StoreResult;
use crate::test_runs::repo_types::{NewTestResult, ResultCounts, TestResult, TestResultRow, TestStatus};

/// Append-only store of test results. Listings are newest first.
#[async_trait]
pub trait TestResultRepo: Send + Sync {
    async fn insert_result(&self, new: NewTestResult) -> StoreResult<TestResult>;
    async fn results_for_project(&self, project_id: i64) -> StoreResult<Vec<TestResult>>;
    async fn all_results(&self) -> StoreResult<Vec<TestResult>>;
    async fn recent_results(&self, limit: i64) -> StoreResult<Vec<TestResult>>;
    async fn result_counts(&self) -> StoreResult<ResultCounts>;
}

#[derive(Clone)]
pub struct PgTestResultRepo {
    db: PgPool,
}

impl PgTestResultRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TestResultRepo for PgTestResultRepo {
    async fn insert_result(&self, new: NewTestResult) -> StoreResult<TestResult> {
        let row = sqlx::query_as::<_, TestResultRow>(
            r#"
            WITH inserted AS (
                INSERT INTO test_results (uuid, project_id, status, code_quality, security_issues,
                                          performance_metrics, test_summary, commit_info, execution_logs)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            )
            SELECT r.id, r.uuid, r.project_id, r.status, r.code_quality, r.security_issues,
                   r.performance_metrics, r.test_summary, r.commit_info, r.execution_logs,
                   r.execution_date, p.uuid AS project_uuid, p.name AS project_name
              FROM inserted r
              JOIN projects p ON p.id = r.project_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.project_id)
        .bind(new.status)
        .bind(new.code_quality)
        .bind(new.security_issues)
        .bind(new.performance_metrics)
        .bind(new.test_summary)
        .bind(new.commit_info)
        .bind(new.execution_logs)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn results_for_project(&self, project_id: i64) -> StoreResult<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            r#"
            SELECT r.id, r.uuid, r.project_id, r.status, r.code_quality, r.security_issues,
                   r.performance_metrics, r.test_summary, r.commit_info, r.execution_logs,
                   r.execution_date, p.uuid AS project_uuid, p.name AS project_name
              FROM test_results r
              JOIN projects p ON p.id = r.project_id
             WHERE r.project_id = $1
             ORDER BY r.execution_date DESC, r.id DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(TestResult::from).collect())
    }

    async fn all_results(&self) -> StoreResult<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            r#"
            SELECT r.id, r.uuid, r.project_id, r.status, r.code_quality, r.security_issues,
                   r.performance_metrics, r.test_summary, r.commit_info, r.execution_logs,
                   r.execution_date, p.uuid AS project_uuid, p.name AS project_name
              FROM test_results r
              JOIN projects p ON p.id = r.project_id
             ORDER BY r.execution_date DESC, r.id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(TestResult::from).collect())
    }

    async fn recent_results(&self, limit: i64) -> StoreResult<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            r#"
            SELECT r.id, r.uuid, r.project_id, r.status, r.code_quality, r.security_issues,
                   r.performance_metrics, r.test_summary, r.commit_info, r.execution_logs,
                   r.execution_date, p.uuid AS project_uuid, p.name AS project_name
              FROM test_results r
              JOIN projects p ON p.id = r.project_id
             ORDER BY r.execution_date DESC, r.id DESC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(TestResult::from).collect())
    }

    async fn result_counts(&self) -> StoreResult<ResultCounts> {
        let (total, success): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = $1)
              FROM test_results
            "#,
        )
        .bind(TestStatus::Success)
        .fetch_one(&self.db)
        .await?;
        Ok(ResultCounts { total, success })
    }
}
