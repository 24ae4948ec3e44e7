use serde::Serialize;
use sqlx::{types::Json, FromRow};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Owner summary embedded in project payloads.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Owner {
    pub uuid: Uuid,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip)]
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    #[serde(skip)]
    pub user_id: i64, // owner
    #[serde(rename = "fechaInicio", with = "iso_date")]
    pub start_date: Date,
    #[serde(rename = "fechaEstimacion", with = "iso_date")]
    pub estimated_date: Date,
    #[serde(rename = "estado")]
    pub status: String,
    pub repository_url: Option<String>,
    pub user: Owner,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated project fields, written whole on create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub start_date: Date,
    pub estimated_date: Date,
    pub status: String,
    pub repository_url: Option<String>,
}

impl From<&Project> for ProjectDraft {
    fn from(p: &Project) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone(),
            technologies: p.technologies.clone(),
            start_date: p.start_date,
            estimated_date: p.estimated_date,
            status: p.status.clone(),
            repository_url: p.repository_url.clone(),
        }
    }
}

/// Search criteria; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub query: Option<String>,
    pub status: Option<String>,
    pub technology: Option<String>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        let query_ok = self.query.as_deref().map_or(true, |q| {
            contains(&project.name, q) || contains(&project.description, q)
        });
        let status_ok = self
            .status
            .as_deref()
            .map_or(true, |s| project.status == s);
        let technology_ok = self.technology.as_deref().map_or(true, |t| {
            project.technologies.iter().any(|tech| contains(tech, t))
        });
        query_ok && status_ok && technology_ok
    }
}

/// Project joined with its owner, as read from Postgres.
#[derive(Debug, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub technologies: Json<Vec<String>>,
    pub user_id: i64,
    pub start_date: Date,
    pub estimated_date: Date,
    pub status: String,
    pub repository_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub owner_uuid: Uuid,
    pub owner_name: String,
    pub owner_username: String,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Self {
            id: r.id,
            uuid: r.uuid,
            name: r.name,
            description: r.description,
            technologies: r.technologies.0,
            user_id: r.user_id,
            start_date: r.start_date,
            estimated_date: r.estimated_date,
            status: r.status,
            repository_url: r.repository_url,
            user: Owner {
                uuid: r.owner_uuid,
                name: r.owner_name,
                username: r.owner_username,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
