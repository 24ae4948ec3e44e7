use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{auth, dashboard, projects, test_runs, users};

const BODY_LIMIT: usize = 10 * 1024 * 1024;

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin = HeaderValue::from_str(origin).context("CORS_ORIGIN is not a valid header value")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(state.config.cors_origin.as_deref())?;
    Ok(Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(projects::router())
        .merge(test_runs::router())
        .merge(dashboard::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        ))
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::test_runs::metrics::FixedMetrics;
    use crate::users::repo::UserRepo;
    use crate::users::repo_types::{NewUser, Role};
    use axum::{
        body::Body,
        http::{HeaderMap, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_state(AppState::fake())
        }

        fn with_state(state: AppState) -> Self {
            let app = build_app(state.clone()).unwrap();
            Self { app, state }
        }

        async fn user(&self, username: &str, password: &str, role: Role) {
            self.state
                .users
                .create(NewUser {
                    name: format!("{username} name"),
                    username: username.into(),
                    password_hash: hash_password(password).unwrap(),
                    role,
                })
                .await
                .unwrap();
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            cookie: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, HeaderMap, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(cookie) = cookie {
                req = req.header(header::COOKIE, cookie);
            }
            let req = match body {
                Some(body) => req
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => req.body(Body::empty()).unwrap(),
            };

            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let headers = res.headers().clone();
            let bytes = res.into_body().collect().await.unwrap().to_bytes();
            let json = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            (status, headers, json)
        }

        /// Logs in and returns the `name=token` pair for the Cookie header.
        async fn login(&self, username: &str, password: &str) -> String {
            let (status, headers, _) = self
                .send(
                    "POST",
                    "/login",
                    None,
                    Some(json!({ "username": username, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            let cookie = headers[header::SET_COOKIE].to_str().unwrap();
            cookie.split(';').next().unwrap().to_string()
        }
    }

    fn project_body(name: &str) -> Value {
        json!({
            "name": name,
            "description": "Tracks builds",
            "technologies": ["Rust", "Postgres"],
            "fechaInicio": "2024-01-01",
            "fechaEstimacion": "2024-02-01",
            "estado": "activo",
            "repositoryUrl": "https://example.com/p1"
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let (status, _, body) = h.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn login_me_logout_cycle() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;

        let cookie = h.login("ada", "secret-pw").await;
        assert!(cookie.starts_with("sid="));

        let (status, _, me) = h.send("GET", "/me", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "ada");
        assert_eq!(me["role"], "user");
        assert!(me.get("passwordHash").is_none());

        let (status, headers, body) = h.send("DELETE", "/logout", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["msg"].is_string());
        assert!(headers[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));

        let (status, _, body) = h.send("GET", "/me", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["msg"].is_string());
    }

    #[tokio::test]
    async fn bearer_token_is_accepted() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;
        let cookie = h.login("ada", "secret-pw").await;
        let token = cookie.trim_start_matches("sid=");

        let req = Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_logins_set_no_cookie() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;

        let (status, headers, body) = h
            .send("POST", "/login", None, Some(json!({ "username": "ada", "password": "nope" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert_eq!(body["msg"], "Incorrect password");

        let (status, _, _) = h
            .send("POST", "/login", None, Some(json!({ "username": "ghost", "password": "x" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = h.send("POST", "/login", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deactivated_account_with_wrong_password_gets_bad_request() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;
        let ada = h.state.users.find_by_username("ada").await.unwrap().unwrap();
        h.state.users.set_active(ada.uuid, false).await.unwrap();

        let (status, headers, body) = h
            .send("POST", "/login", None, Some(json!({ "username": "ada", "password": "WRONG" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert_eq!(body["msg"], "Incorrect password");
    }

    #[tokio::test]
    async fn malformed_json_uses_envelope() {
        let h = Harness::new();
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["msg"].is_string());
    }

    #[tokio::test]
    async fn protected_routes_need_a_session() {
        let h = Harness::new();
        for (method, uri) in [
            ("GET", "/projects"),
            ("GET", "/tests"),
            ("GET", "/dashboard/stats"),
            ("GET", "/users"),
        ] {
            let (status, _, _) = h.send(method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn user_management_is_admin_only() {
        let h = Harness::new();
        h.user("root", "admin-pw", Role::Admin).await;
        h.user("ada", "secret-pw", Role::User).await;

        let user_cookie = h.login("ada", "secret-pw").await;
        let (status, _, _) = h.send("GET", "/users", Some(&user_cookie), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = h.login("root", "admin-pw").await;
        let (status, _, created) = h
            .send(
                "POST",
                "/users",
                Some(&admin),
                Some(json!({
                    "name": "Linus",
                    "username": "linus",
                    "password": "kernel-pw",
                    "confPassword": "kernel-pw",
                    "role": "user"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["msg"], "User created");
        let id = created["user"]["uuid"].as_str().unwrap().to_string();

        let (status, _, _) = h
            .send(
                "POST",
                "/users",
                Some(&admin),
                Some(json!({
                    "name": "Linus",
                    "username": "linus",
                    "password": "kernel-pw",
                    "confirmPassword": "kernel-pw",
                    "role": "user"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = h.send("DELETE", &format!("/users/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = h.send("GET", &format!("/users/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, _, listed) = h.send("GET", "/users", Some(&admin), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 2);
        let (_, _, listed) = h
            .send("GET", "/users?includeInactive=true", Some(&admin), None)
            .await;
        assert_eq!(listed.as_array().unwrap().len(), 3);

        let (status, _, toggled) = h
            .send("PATCH", &format!("/users/toggle/{id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["isActive"], true);
    }

    #[tokio::test]
    async fn deactivated_user_loses_session() {
        let h = Harness::new();
        h.user("root", "admin-pw", Role::Admin).await;
        h.user("ada", "secret-pw", Role::User).await;
        let admin = h.login("root", "admin-pw").await;
        let ada = h.login("ada", "secret-pw").await;

        let (_, _, me) = h.send("GET", "/me", Some(&ada), None).await;
        let id = me["uuid"].as_str().unwrap().to_string();
        h.send("DELETE", &format!("/users/{id}"), Some(&admin), None).await;

        let (status, _, _) = h.send("GET", "/me", Some(&ada), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _, _) = h
            .send("POST", "/login", None, Some(json!({ "username": "ada", "password": "secret-pw" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn project_run_delete_scenario() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;
        let cookie = h.login("ada", "secret-pw").await;

        let (status, headers, created) = h
            .send("POST", "/projects", Some(&cookie), Some(project_body("P1")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["project"]["uuid"].as_str().unwrap().to_string();
        assert_eq!(
            headers[header::LOCATION].to_str().unwrap(),
            format!("/projects/{id}")
        );
        assert_eq!(created["project"]["fechaInicio"], "2024-01-01");
        assert_eq!(created["project"]["user"]["username"], "ada");

        let (status, _, run) = h
            .send("POST", &format!("/projects/{id}/tests"), Some(&cookie), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(["SUCCESS", "FAILED"].contains(&run["status"].as_str().unwrap()));
        assert_eq!(run["project"]["name"], "P1");

        let (_, _, history) = h
            .send("GET", &format!("/projects/{id}/tests"), Some(&cookie), None)
            .await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        let (_, _, stats) = h.send("GET", "/dashboard/stats", Some(&cookie), None).await;
        assert_eq!(stats["activeProjects"], 1);
        assert_eq!(stats["totalTests"], 1);
        assert_eq!(stats["recentActivity"].as_array().unwrap().len(), 1);

        let (status, _, _) = h
            .send("DELETE", &format!("/projects/{id}"), Some(&cookie), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = h
            .send("GET", &format!("/projects/{id}"), Some(&cookie), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, _, all) = h.send("GET", "/tests", Some(&cookie), None).await;
        assert!(all.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_owner_or_admin_mutates_projects() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;
        h.user("bob", "other-pw", Role::User).await;
        h.user("root", "admin-pw", Role::Admin).await;
        let ada = h.login("ada", "secret-pw").await;
        let bob = h.login("bob", "other-pw").await;
        let root = h.login("root", "admin-pw").await;

        let (_, _, created) = h
            .send("POST", "/projects", Some(&ada), Some(project_body("P1")))
            .await;
        let id = created["project"]["uuid"].as_str().unwrap().to_string();
        let uri = format!("/projects/{id}");

        let (status, _, _) = h
            .send("PATCH", &uri, Some(&bob), Some(json!({ "estado": "cerrado" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, _) = h.send("DELETE", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // anyone signed in can read it
        let (status, _, _) = h.send("GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, updated) = h
            .send("PATCH", &uri, Some(&root), Some(json!({ "status": "cerrado" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["project"]["estado"], "cerrado");
        assert_eq!(updated["project"]["name"], "P1");
    }

    #[tokio::test]
    async fn search_and_bad_ids() {
        let h = Harness::new();
        h.user("ada", "secret-pw", Role::User).await;
        let cookie = h.login("ada", "secret-pw").await;
        h.send("POST", "/projects", Some(&cookie), Some(project_body("Billing")))
            .await;
        h.send("POST", "/projects", Some(&cookie), Some(project_body("Catalog")))
            .await;

        let (status, _, hits) = h
            .send("GET", "/projects/search?q=BILL", Some(&cookie), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (_, _, hits) = h
            .send("GET", "/projects/search?query=bill", Some(&cookie), None)
            .await;
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (_, _, hits) = h
            .send("GET", "/projects/search?technology=rust", Some(&cookie), None)
            .await;
        assert_eq!(hits.as_array().unwrap().len(), 2);

        let (status, _, _) = h
            .send("GET", "/projects/not-a-uuid", Some(&cookie), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fixed_provider_rejects_projects_without_repository() {
        let h = Harness::with_state(AppState::fake_with_metrics(Arc::new(FixedMetrics)));
        h.user("ada", "secret-pw", Role::User).await;
        let cookie = h.login("ada", "secret-pw").await;

        let mut body = project_body("P1");
        body["repositoryUrl"] = Value::Null;
        let (_, _, created) = h.send("POST", "/projects", Some(&cookie), Some(body)).await;
        let id = created["project"]["uuid"].as_str().unwrap().to_string();

        let (status, _, _) = h
            .send("POST", &format!("/projects/{id}/tests"), Some(&cookie), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, _, history) = h
            .send("GET", &format!("/projects/{id}/tests"), Some(&cookie), None)
            .await;
        assert!(history.as_array().unwrap().is_empty());
    }

    #[test]
    fn cors_origin_must_be_a_header_value() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://app.example.com")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
