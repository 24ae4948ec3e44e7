use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::db::StoreResult;
use crate::projects::repo_types::{Project, ProjectDraft, ProjectFilter, ProjectRow};

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
    async fn find_project(&self, uuid: Uuid) -> StoreResult<Option<Project>>;
    async fn create_project(&self, owner_id: i64, draft: ProjectDraft) -> StoreResult<Project>;
    async fn update_project(&self, uuid: Uuid, draft: ProjectDraft) -> StoreResult<Option<Project>>;
    /// Hard delete; test results go with the project. Returns whether a row was removed.
    async fn delete_project(&self, uuid: Uuid) -> StoreResult<bool>;
    async fn search_projects(&self, filter: &ProjectFilter) -> StoreResult<Vec<Project>>;
    /// Projects whose trimmed, lowercased status is one of `statuses`.
    async fn count_projects_with_status(&self, statuses: &[String]) -> StoreResult<i64>;
}

#[derive(Clone)]
pub struct PgProjectRepo {
    db: PgPool,
}

impl PgProjectRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT p.id, p.uuid, p.name, p.description, p.technologies, p.user_id,
                   p.start_date, p.estimated_date, p.status, p.repository_url,
                   p.created_at, p.updated_at,
                   u.uuid AS owner_uuid, u.name AS owner_name, u.username AS owner_username
              FROM projects p
              JOIN users u ON u.id = p.user_id
             WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl ProjectRepo for PgProjectRepo {
    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT p.id, p.uuid, p.name, p.description, p.technologies, p.user_id,
                   p.start_date, p.estimated_date, p.status, p.repository_url,
                   p.created_at, p.updated_at,
                   u.uuid AS owner_uuid, u.name AS owner_name, u.username AS owner_username
              FROM projects p
              JOIN users u ON u.id = p.user_id
             ORDER BY p.created_at, p.id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn find_project(&self, uuid: Uuid) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT p.id, p.uuid, p.name, p.description, p.technologies, p.user_id,
                   p.start_date, p.estimated_date, p.status, p.repository_url,
                   p.created_at, p.updated_at,
                   u.uuid AS owner_uuid, u.name AS owner_name, u.username AS owner_username
              FROM projects p
              JOIN users u ON u.id = p.user_id
             WHERE p.uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Project::from))
    }

    async fn create_project(&self, owner_id: i64, draft: ProjectDraft) -> StoreResult<Project> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO projects (uuid, name, description, technologies, user_id,
                                  start_date, estimated_date, status, repository_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(Json(&draft.technologies))
        .bind(owner_id)
        .bind(draft.start_date)
        .bind(draft.estimated_date)
        .bind(&draft.status)
        .bind(&draft.repository_url)
        .fetch_one(&self.db)
        .await?;
        self.find_by_id(id).await
    }

    async fn update_project(&self, uuid: Uuid, draft: ProjectDraft) -> StoreResult<Option<Project>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE projects
               SET name = $2, description = $3, technologies = $4,
                   start_date = $5, estimated_date = $6, status = $7,
                   repository_url = $8, updated_at = now()
             WHERE uuid = $1
            RETURNING id
            "#,
        )
        .bind(uuid)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(Json(&draft.technologies))
        .bind(draft.start_date)
        .bind(draft.estimated_date)
        .bind(&draft.status)
        .bind(&draft.repository_url)
        .fetch_optional(&self.db)
        .await?;
        match id {
            Some(id) => Ok(Some(self.find_by_id(id).await?)),
            None => Ok(None),
        }
    }

    async fn delete_project(&self, uuid: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM projects WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn search_projects(&self, filter: &ProjectFilter) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT p.id, p.uuid, p.name, p.description, p.technologies, p.user_id,
                   p.start_date, p.estimated_date, p.status, p.repository_url,
                   p.created_at, p.updated_at,
                   u.uuid AS owner_uuid, u.name AS owner_name, u.username AS owner_username
              FROM projects p
              JOIN users u ON u.id = p.user_id
             WHERE ($1::text IS NULL
                    OR strpos(lower(p.name), lower($1)) > 0
                    OR strpos(lower(p.description), lower($1)) > 0)
               AND ($2::text IS NULL OR p.status = $2)
               AND ($3::text IS NULL OR EXISTS (
                       SELECT 1 FROM jsonb_array_elements_text(p.technologies) AS t(tech)
                        WHERE strpos(lower(t.tech), lower($3)) > 0))
             ORDER BY p.created_at, p.id
            "#,
        )
        .bind(&filter.query)
        .bind(&filter.status)
        .bind(&filter.technology)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn count_projects_with_status(&self, statuses: &[String]) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE lower(btrim(status)) = ANY($1)",
        )
        .bind(statuses)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }
}
