use serde::{Deserialize, Serialize};

use crate::projects::repo_types::Project;

/// Technologies arrive either as a JSON list or as one comma separated string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TechList {
    Many(Vec<String>),
    One(String),
}

impl TechList {
    /// Trimmed, non-empty entries.
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            TechList::Many(v) => v,
            TechList::One(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Body of project create and update. Create requires every field except the
/// repository URL; update takes any subset.
///
/// Dates and status come under their Spanish or English names; when a body
/// carries both, the Spanish one wins.
#[derive(Debug, Default, Deserialize)]
#[serde(from = "RawProjectRequest")]
pub struct ProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub technologies: Option<TechList>,
    pub start_date: Option<String>,
    pub estimated_date: Option<String>,
    pub status: Option<String>,
    pub repository_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawProjectRequest {
    name: Option<String>,
    description: Option<String>,
    technologies: Option<TechList>,
    #[serde(rename = "fechaInicio")]
    fecha_inicio: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "fechaEstimacion")]
    fecha_estimacion: Option<String>,
    #[serde(rename = "estimatedDate")]
    estimated_date: Option<String>,
    estado: Option<String>,
    status: Option<String>,
    #[serde(rename = "repositoryUrl")]
    repository_url: Option<String>,
}

impl From<RawProjectRequest> for ProjectRequest {
    fn from(raw: RawProjectRequest) -> Self {
        Self {
            name: raw.name,
            description: raw.description,
            technologies: raw.technologies,
            start_date: raw.fecha_inicio.or(raw.start_date),
            estimated_date: raw.fecha_estimacion.or(raw.estimated_date),
            status: raw.estado.or(raw.status),
            repository_url: raw.repository_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub msg: String,
    pub project: Project,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    #[serde(alias = "query")]
    pub q: Option<String>,
    pub status: Option<String>,
    pub technology: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_field_spellings() {
        let spanish: ProjectRequest = serde_json::from_value(serde_json::json!({
            "name": "P1",
            "fechaInicio": "2024-01-01",
            "fechaEstimacion": "2024-02-01",
            "estado": "activo",
            "repositoryUrl": "https://example.com/p1"
        }))
        .unwrap();
        assert_eq!(spanish.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(spanish.status.as_deref(), Some("activo"));
        assert_eq!(spanish.repository_url.as_deref(), Some("https://example.com/p1"));

        let english: ProjectRequest = serde_json::from_value(serde_json::json!({
            "startDate": "2024-01-01",
            "estimatedDate": "2024-02-01",
            "status": "active"
        }))
        .unwrap();
        assert_eq!(english.estimated_date.as_deref(), Some("2024-02-01"));
        assert_eq!(english.status.as_deref(), Some("active"));
    }

    #[test]
    fn both_spellings_in_one_body_prefer_spanish() {
        let both: ProjectRequest = serde_json::from_value(serde_json::json!({
            "estado": "activo",
            "status": "active",
            "fechaInicio": "2024-01-01",
            "startDate": "2023-12-31"
        }))
        .unwrap();
        assert_eq!(both.status.as_deref(), Some("activo"));
        assert_eq!(both.start_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn search_text_as_q_or_query() {
        let short: SearchQuery =
            serde_json::from_value(serde_json::json!({ "q": "bill" })).unwrap();
        let long: SearchQuery =
            serde_json::from_value(serde_json::json!({ "query": "bill" })).unwrap();
        assert_eq!(short.q.as_deref(), Some("bill"));
        assert_eq!(long.q.as_deref(), Some("bill"));
    }

    #[test]
    fn technologies_from_list_or_string() {
        let list: ProjectRequest =
            serde_json::from_value(serde_json::json!({ "technologies": ["Rust", " Axum ", ""] }))
                .unwrap();
        assert_eq!(list.technologies.unwrap().into_vec(), vec!["Rust", "Axum"]);

        let text: ProjectRequest =
            serde_json::from_value(serde_json::json!({ "technologies": "Rust, Postgres" }))
                .unwrap();
        assert_eq!(text.technologies.unwrap().into_vec(), vec!["Rust", "Postgres"]);
    }
}
