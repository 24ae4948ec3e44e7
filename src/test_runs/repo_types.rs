use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Terminal state of a run; a row never changes status after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "test_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Success,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProjectRef {
    pub uuid: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(skip)]
    pub id: i64,
    pub uuid: Uuid,
    #[serde(skip)]
    pub project_id: i64,
    pub project: ProjectRef,
    pub status: TestStatus,
    pub code_quality: Option<Value>,
    pub security_issues: Option<Value>,
    pub performance_metrics: Option<Value>,
    pub test_summary: Option<Value>,
    pub commit_info: Option<Value>,
    pub execution_logs: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub execution_date: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTestResult {
    pub project_id: i64,
    pub status: TestStatus,
    pub code_quality: Option<Value>,
    pub security_issues: Option<Value>,
    pub performance_metrics: Option<Value>,
    pub test_summary: Option<Value>,
    pub commit_info: Option<Value>,
    pub execution_logs: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub total: i64,
    pub success: i64,
}

#[derive(Debug, FromRow)]
pub struct TestResultRow {
    pub id: i64,
    pub uuid: Uuid,
    pub project_id: i64,
    pub status: TestStatus,
    pub code_quality: Option<Value>,
    pub security_issues: Option<Value>,
    pub performance_metrics: Option<Value>,
    pub test_summary: Option<Value>,
    pub commit_info: Option<Value>,
    pub execution_logs: Option<String>,
    pub execution_date: OffsetDateTime,
    pub project_uuid: Uuid,
    pub project_name: String,
}

impl From<TestResultRow> for TestResult {
    fn from(r: TestResultRow) -> Self {
        Self {
            id: r.id,
            uuid: r.uuid,
            project_id: r.project_id,
            project: ProjectRef {
                uuid: r.project_uuid,
                name: r.project_name,
            },
            status: r.status,
            code_quality: r.code_quality,
            security_issues: r.security_issues,
            performance_metrics: r.performance_metrics,
            test_summary: r.test_summary,
            commit_info: r.commit_info,
            execution_logs: r.execution_logs,
            execution_date: r.execution_date,
        }
    }
}
