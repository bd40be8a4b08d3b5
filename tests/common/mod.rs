#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use gespack_api::{
    config::AppConfig,
    db,
    entities::{site, user},
    services::users::NewUser,
    AppState,
};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

/// Decoded response of a test request
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// Application backed by a throwaway SQLite file with sites 7 and 9.
///
/// `token` belongs to `clerk`, who is only assigned to site 7.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub token: String,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_pool_size(1).await
    }

    /// Same as [`TestApp::new`] with up to `max_connections` pooled connections
    pub async fn with_pool_size(max_connections: u32) -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("gespack_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;
        cfg.order_retry_min_delay_ms = 1;
        cfg.order_retry_max_delay_ms = 5;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        for (site_id, code) in [(7, "LYON"), (9, "NANTES")] {
            site::ActiveModel {
                site_id: Set(site_id),
                code: Set(code.to_string()),
                name: Set(format!("Site {code}")),
                created_at: Set(Utc::now()),
            }
            .insert(&pool)
            .await
            .expect("seed site");
        }

        let state = AppState::new(Arc::new(pool), cfg);
        let router = gespack_api::build_router(state.clone());

        let mut app = Self {
            router,
            state,
            token: String::new(),
            _db_dir: db_dir,
        };
        app.token = app.create_user("clerk", &[7]).await;
        app
    }

    /// Creates a user on the given sites and returns a token for it
    pub async fn create_user(&self, username: &str, site_ids: &[i32]) -> String {
        let users = &self.state.services.users;
        users
            .create_user(NewUser {
                username: username.to_string(),
                display_name: format!("{username} display"),
                password: PASSWORD.to_string(),
                role: user::ROLE_USER.to_string(),
                site_ids: site_ids.to_vec(),
            })
            .await
            .expect("seed user");

        let model = users
            .find_by_username(username)
            .await
            .expect("query user")
            .expect("user exists");
        self.state
            .auth
            .generate_token(&model, site_ids)
            .expect("issue token")
            .access_token
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sends a JSON request with an optional bearer token
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {tok}"));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("build request")).await
    }

    /// Request authenticated as the default clerk
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> TestResponse {
        self.request(method, uri, body, Some(&self.token)).await
    }

    pub async fn count<E>(&self) -> u64
    where
        E: EntityTrait,
        E::Model: Sync,
    {
        E::find()
            .count(&*self.state.db)
            .await
            .expect("count rows")
    }
}
