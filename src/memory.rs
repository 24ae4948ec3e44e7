//! In-memory backend for every repository trait.
//!
//! One `MemoryStore` holds all three tables behind a single lock so joins and
//! the project -> test result cascade see a consistent view. It serves tests
//! and runs without `DATABASE_URL`; nothing survives a restart.

use std::cmp::Reverse;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::{StoreError, StoreResult},
    projects::{
        repo::ProjectRepo,
        repo_types::{Owner, Project, ProjectDraft, ProjectFilter},
    },
    test_runs::{
        repo::TestResultRepo,
        repo_types::{NewTestResult, ProjectRef, ResultCounts, TestResult, TestStatus},
    },
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User, UserChanges},
    },
};

struct ProjectRecord {
    id: i64,
    uuid: Uuid,
    user_id: i64,
    draft: ProjectDraft,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

struct ResultRecord {
    id: i64,
    uuid: Uuid,
    row: NewTestResult,
    execution_date: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<ProjectRecord>,
    results: Vec<ResultRecord>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && Some(u.uuid) != except)
    }

    fn join_project(&self, rec: &ProjectRecord) -> StoreResult<Project> {
        let owner = self
            .users
            .iter()
            .find(|u| u.id == rec.user_id)
            .ok_or_else(|| anyhow!("project {} references missing user {}", rec.uuid, rec.user_id))?;
        let d = &rec.draft;
        Ok(Project {
            id: rec.id,
            uuid: rec.uuid,
            name: d.name.clone(),
            description: d.description.clone(),
            technologies: d.technologies.clone(),
            user_id: rec.user_id,
            start_date: d.start_date,
            estimated_date: d.estimated_date,
            status: d.status.clone(),
            repository_url: d.repository_url.clone(),
            user: Owner {
                uuid: owner.uuid,
                name: owner.name.clone(),
                username: owner.username.clone(),
            },
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        })
    }

    fn join_result(&self, rec: &ResultRecord) -> StoreResult<TestResult> {
        let project = self
            .projects
            .iter()
            .find(|p| p.id == rec.row.project_id)
            .ok_or_else(|| anyhow!("result {} references missing project", rec.uuid))?;
        let r = &rec.row;
        Ok(TestResult {
            id: rec.id,
            uuid: rec.uuid,
            project_id: r.project_id,
            project: ProjectRef {
                uuid: project.uuid,
                name: project.draft.name.clone(),
            },
            status: r.status,
            code_quality: r.code_quality.clone(),
            security_issues: r.security_issues.clone(),
            performance_metrics: r.performance_metrics.clone(),
            test_summary: r.test_summary.clone(),
            commit_info: r.commit_info.clone(),
            execution_logs: r.execution_logs.clone(),
            execution_date: rec.execution_date,
        })
    }

    /// Results newest first, optionally for one project.
    fn newest_results(&self, project_id: Option<i64>) -> StoreResult<Vec<TestResult>> {
        let mut recs: Vec<&ResultRecord> = self
            .results
            .iter()
            .filter(|r| project_id.map_or(true, |id| r.row.project_id == id))
            .collect();
        recs.sort_by_key(|r| Reverse((r.execution_date, r.id)));
        recs.into_iter().map(|r| self.join_result(r)).collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .iter()
            .filter(|u| include_inactive || u.is_active)
            .cloned()
            .collect())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.uuid == uuid).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.username_taken(&new.username, None) {
            return Err(StoreError::Duplicate("username".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: t.next_id(),
            uuid: Uuid::new_v4(),
            name: new.name,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, uuid: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(username) = &changes.username {
            if t.username_taken(username, Some(uuid)) {
                return Err(StoreError::Duplicate("username".into()));
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.uuid == uuid) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_active(&self, uuid: Uuid, active: bool) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.uuid == uuid).map(|user| {
            user.is_active = active;
            user.updated_at = OffsetDateTime::now_utc();
            user.clone()
        }))
    }
}

#[async_trait]
impl ProjectRepo for MemoryStore {
    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let t = self.tables.read().await;
        t.projects.iter().map(|p| t.join_project(p)).collect()
    }

    async fn find_project(&self, uuid: Uuid) -> StoreResult<Option<Project>> {
        let t = self.tables.read().await;
        t.projects
            .iter()
            .find(|p| p.uuid == uuid)
            .map(|p| t.join_project(p))
            .transpose()
    }

    async fn create_project(&self, owner_id: i64, draft: ProjectDraft) -> StoreResult<Project> {
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == owner_id) {
            return Err(anyhow!("owner {owner_id} does not exist").into());
        }
        let now = OffsetDateTime::now_utc();
        let rec = ProjectRecord {
            id: t.next_id(),
            uuid: Uuid::new_v4(),
            user_id: owner_id,
            draft,
            created_at: now,
            updated_at: now,
        };
        let project = t.join_project(&rec)?;
        t.projects.push(rec);
        Ok(project)
    }

    async fn update_project(&self, uuid: Uuid, draft: ProjectDraft) -> StoreResult<Option<Project>> {
        let mut t = self.tables.write().await;
        let Some(idx) = t.projects.iter().position(|p| p.uuid == uuid) else {
            return Ok(None);
        };
        let rec = &mut t.projects[idx];
        rec.draft = draft;
        rec.updated_at = OffsetDateTime::now_utc();
        t.join_project(&t.projects[idx]).map(Some)
    }

    async fn delete_project(&self, uuid: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let Some(idx) = t.projects.iter().position(|p| p.uuid == uuid) else {
            return Ok(false);
        };
        let removed = t.projects.remove(idx);
        t.results.retain(|r| r.row.project_id != removed.id);
        Ok(true)
    }

    async fn search_projects(&self, filter: &ProjectFilter) -> StoreResult<Vec<Project>> {
        let t = self.tables.read().await;
        let mut out = Vec::new();
        for rec in &t.projects {
            let project = t.join_project(rec)?;
            if filter.matches(&project) {
                out.push(project);
            }
        }
        Ok(out)
    }

    async fn count_projects_with_status(&self, statuses: &[String]) -> StoreResult<i64> {
        let t = self.tables.read().await;
        let count = t
            .projects
            .iter()
            .filter(|p| statuses.contains(&p.draft.status.trim().to_lowercase()))
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl TestResultRepo for MemoryStore {
    async fn insert_result(&self, new: NewTestResult) -> StoreResult<TestResult> {
        let mut t = self.tables.write().await;
        if !t.projects.iter().any(|p| p.id == new.project_id) {
            return Err(anyhow!("project {} does not exist", new.project_id).into());
        }
        let rec = ResultRecord {
            id: t.next_id(),
            uuid: Uuid::new_v4(),
            row: new,
            execution_date: OffsetDateTime::now_utc(),
        };
        let result = t.join_result(&rec)?;
        t.results.push(rec);
        Ok(result)
    }

    async fn results_for_project(&self, project_id: i64) -> StoreResult<Vec<TestResult>> {
        self.tables.read().await.newest_results(Some(project_id))
    }

    async fn all_results(&self) -> StoreResult<Vec<TestResult>> {
        self.tables.read().await.newest_results(None)
    }

    async fn recent_results(&self, limit: i64) -> StoreResult<Vec<TestResult>> {
        let mut results = self.tables.read().await.newest_results(None)?;
        results.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(results)
    }

    async fn result_counts(&self) -> StoreResult<ResultCounts> {
        let t = self.tables.read().await;
        let success = t
            .results
            .iter()
            .filter(|r| r.row.status == TestStatus::Success)
            .count();
        Ok(ResultCounts {
            total: t.results.len() as i64,
            success: success as i64,
        })
    }
}
