use lazy_static::lazy_static;
use regex::Regex;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::policy,
    error::ApiError,
    projects::{
        dto::{ProjectRequest, SearchQuery},
        repo::ProjectRepo,
        repo_types::{Project, ProjectDraft, ProjectFilter},
    },
    users::repo_types::{Role, User},
};

const NAME_LEN: (usize, usize) = (3, 100);
const NOT_OWNER: &str = "Only the owner or an admin can change this project";

pub(crate) fn is_valid_repository_url(url: &str) -> bool {
    lazy_static! {
        static ref REPO_URL_RE: Regex = Regex::new(r"^https?://\S+$").unwrap();
    }
    REPO_URL_RE.is_match(url)
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, keeping its date.
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<Date, ApiError> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339).map(|dt| dt.date()))
        .map_err(|_| ApiError::validation(format!("{field} is not a valid date")))
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate(draft: &ProjectDraft) -> Result<(), ApiError> {
    let len = draft.name.chars().count();
    if len < NAME_LEN.0 || len > NAME_LEN.1 {
        return Err(ApiError::validation(format!(
            "name must be between {} and {} characters",
            NAME_LEN.0, NAME_LEN.1
        )));
    }
    if draft.description.is_empty() || draft.status.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    if draft.technologies.is_empty() {
        return Err(ApiError::validation("At least one technology is required"));
    }
    if draft.estimated_date <= draft.start_date {
        return Err(ApiError::validation(
            "Estimated date must be after the start date",
        ));
    }
    if let Some(url) = &draft.repository_url {
        if !is_valid_repository_url(url) {
            return Err(ApiError::validation("Repository URL is not valid"));
        }
    }
    Ok(())
}

pub async fn get_project(repo: &dyn ProjectRepo, uuid: Uuid) -> Result<Project, ApiError> {
    repo.find_project(uuid)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

pub async fn create_project(
    repo: &dyn ProjectRepo,
    owner: &User,
    req: ProjectRequest,
) -> Result<Project, ApiError> {
    let technologies = req.technologies.map(|t| t.into_vec()).unwrap_or_default();
    let (Some(name), Some(description), Some(start), Some(estimated), Some(status)) = (
        present(req.name),
        present(req.description),
        present(req.start_date),
        present(req.estimated_date),
        present(req.status),
    ) else {
        return Err(ApiError::validation("All fields are required"));
    };
    if technologies.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }

    let draft = ProjectDraft {
        name,
        description,
        technologies,
        start_date: parse_date("fechaInicio", &start)?,
        estimated_date: parse_date("fechaEstimacion", &estimated)?,
        status,
        repository_url: present(req.repository_url),
    };
    validate(&draft).map_err(|e| {
        warn!(error = %e, "project rejected");
        e
    })?;

    let project = repo.create_project(owner.id, draft).await?;
    info!(project = %project.uuid, owner = %owner.uuid, "project created");
    Ok(project)
}

pub async fn update_project(
    repo: &dyn ProjectRepo,
    actor: &User,
    uuid: Uuid,
    req: ProjectRequest,
) -> Result<Project, ApiError> {
    let existing = get_project(repo, uuid).await?;
    policy::ensure(actor, Some(existing.user_id), Role::User, NOT_OWNER)?;

    let mut draft = ProjectDraft::from(&existing);
    if let Some(name) = req.name {
        draft.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        draft.description = description.trim().to_string();
    }
    if let Some(technologies) = req.technologies {
        draft.technologies = technologies.into_vec();
    }
    if let Some(start) = req.start_date {
        draft.start_date = parse_date("fechaInicio", &start)?;
    }
    if let Some(estimated) = req.estimated_date {
        draft.estimated_date = parse_date("fechaEstimacion", &estimated)?;
    }
    if let Some(status) = req.status {
        draft.status = status.trim().to_string();
    }
    if let Some(url) = req.repository_url {
        // empty string clears the field
        draft.repository_url = present(Some(url));
    }
    validate(&draft).map_err(|e| {
        warn!(project = %uuid, error = %e, "project update rejected");
        e
    })?;

    let project = repo
        .update_project(uuid, draft)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    info!(project = %project.uuid, actor = %actor.uuid, "project updated");
    Ok(project)
}

pub async fn delete_project(
    repo: &dyn ProjectRepo,
    actor: &User,
    uuid: Uuid,
) -> Result<(), ApiError> {
    let existing = get_project(repo, uuid).await?;
    policy::ensure(actor, Some(existing.user_id), Role::User, NOT_OWNER)?;

    if !repo.delete_project(uuid).await? {
        return Err(ApiError::not_found("Project not found"));
    }
    info!(project = %uuid, actor = %actor.uuid, "project deleted");
    Ok(())
}

pub async fn search_projects(
    repo: &dyn ProjectRepo,
    query: SearchQuery,
) -> Result<Vec<Project>, ApiError> {
    let filter = ProjectFilter {
        query: present(query.q),
        status: present(query.status),
        technology: present(query.technology),
    };
    Ok(repo.search_projects(&filter).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::projects::dto::TechList;
    use crate::users::repo::UserRepo;
    use crate::users::repo_types::NewUser;
    use time::macros::date;

    async fn user(store: &MemoryStore, username: &str, role: Role) -> User {
        store
            .create(NewUser {
                name: format!("{username} name"),
                username: username.into(),
                password_hash: "x".into(),
                role,
            })
            .await
            .unwrap()
    }

    fn request(name: &str) -> ProjectRequest {
        ProjectRequest {
            name: Some(name.into()),
            description: Some("Tracks things".into()),
            technologies: Some(TechList::Many(vec!["Rust".into(), "Postgres".into()])),
            start_date: Some("2024-01-01".into()),
            estimated_date: Some("2024-02-01".into()),
            status: Some("activo".into()),
            repository_url: None,
        }
    }

    #[test]
    fn url_pattern() {
        assert!(is_valid_repository_url("https://github.com/acme/p1"));
        assert!(is_valid_repository_url("http://git.local/x"));
        assert!(!is_valid_repository_url("ftp://git.local/x"));
        assert!(!is_valid_repository_url("https://has space"));
        assert!(!is_valid_repository_url("https://"));
    }

    #[test]
    fn dates_in_both_formats() {
        assert_eq!(parse_date("d", "2024-03-05").unwrap(), date!(2024 - 03 - 05));
        assert_eq!(
            parse_date("d", "2024-03-05T10:00:00Z").unwrap(),
            date!(2024 - 03 - 05)
        );
        assert!(matches!(parse_date("d", "05/03/2024"), Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn create_sets_owner() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;
        let p = create_project(&store, &owner, request("P1")).await.unwrap();
        assert_eq!(p.user.uuid, owner.uuid);
        assert_eq!(p.technologies, vec!["Rust", "Postgres"]);
        assert!(p.repository_url.is_none());
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;

        let mut req = request("P1");
        req.description = None;
        assert!(matches!(
            create_project(&store, &owner, req).await,
            Err(ApiError::Validation(m)) if m == "All fields are required"
        ));

        let mut req = request("P1");
        req.technologies = Some(TechList::Many(vec![]));
        assert!(create_project(&store, &owner, req).await.is_err());

        let mut req = request("P1");
        req.estimated_date = Some("2024-01-01".into());
        assert!(matches!(
            create_project(&store, &owner, req).await,
            Err(ApiError::Validation(m)) if m.contains("after the start date")
        ));

        let mut req = request("P1");
        req.repository_url = Some("not a url".into());
        assert!(matches!(
            create_project(&store, &owner, req).await,
            Err(ApiError::Validation(m)) if m == "Repository URL is not valid"
        ));

        assert!(create_project(&store, &owner, request("P")).await.is_err());
        assert!(store.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_merges_and_checks_owner() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;
        let other = user(&store, "other", Role::User).await;
        let admin = user(&store, "admin", Role::Admin).await;
        let mut req = request("P1");
        req.repository_url = Some("https://example.com/p1".into());
        let p = create_project(&store, &owner, req).await.unwrap();

        let change = ProjectRequest {
            status: Some("cerrado".into()),
            ..Default::default()
        };
        let err = update_project(&store, &other, p.uuid, change).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let change = ProjectRequest {
            status: Some("cerrado".into()),
            repository_url: Some(String::new()),
            ..Default::default()
        };
        let updated = update_project(&store, &admin, p.uuid, change).await.unwrap();
        assert_eq!(updated.status, "cerrado");
        assert_eq!(updated.name, "P1");
        assert!(updated.repository_url.is_none());
        assert_eq!(updated.start_date, date!(2024 - 01 - 01));
    }

    #[tokio::test]
    async fn update_validates_merged_dates() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;
        let p = create_project(&store, &owner, request("P1")).await.unwrap();

        let change = ProjectRequest {
            start_date: Some("2024-03-01".into()),
            ..Default::default()
        };
        let err = update_project(&store, &owner, p.uuid, change).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(get_project(&store, p.uuid).await.unwrap().start_date, date!(2024 - 01 - 01));
    }

    #[tokio::test]
    async fn update_rejects_bad_repository_url() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;
        let mut req = request("P1");
        req.repository_url = Some("https://example.com/p1".into());
        let p = create_project(&store, &owner, req).await.unwrap();

        let change = ProjectRequest {
            repository_url: Some("ftp://x".into()),
            ..Default::default()
        };
        let err = update_project(&store, &owner, p.uuid, change).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(m) if m == "Repository URL is not valid"));
        assert_eq!(
            get_project(&store, p.uuid).await.unwrap().repository_url.as_deref(),
            Some("https://example.com/p1")
        );
    }

    #[tokio::test]
    async fn delete_requires_owner_then_removes() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;
        let other = user(&store, "other", Role::User).await;
        let p = create_project(&store, &owner, request("P1")).await.unwrap();

        assert!(matches!(
            delete_project(&store, &other, p.uuid).await,
            Err(ApiError::Forbidden(_))
        ));
        delete_project(&store, &owner, p.uuid).await.unwrap();
        assert!(matches!(
            get_project(&store, p.uuid).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            delete_project(&store, &owner, p.uuid).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn blank_search_filters_match_everything() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner", Role::User).await;
        create_project(&store, &owner, request("Billing")).await.unwrap();
        create_project(&store, &owner, request("Search")).await.unwrap();

        let all = search_projects(
            &store,
            SearchQuery {
                q: Some("  ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);

        let hits = search_projects(
            &store,
            SearchQuery {
                q: Some("bill".into()),
                technology: Some("postgres".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Billing");
    }
}
