//! GesPack API Library
//!
//! Multi-tenant order, customer and product management backend.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod i18n;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<auth::AuthService>,
}

impl AppState {
    /// Wires the services and the auth service around a database pool
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config);
        let auth = Arc::new(auth::AuthService::new(auth::AuthConfig::from(&config)));
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::new(data, None)
    }

    pub fn new(data: T, message: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message,
        }
    }
}

/// Authenticated `/api/v1` routes
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/orders", handlers::orders::order_routes())
        .nest("/customers", handlers::customers::customer_routes())
        .nest("/products", handlers::products::product_routes())
        .nest("/dashboard", handlers::dashboard::dashboard_routes())
        .route_layer(from_fn_with_state(
            state.auth.clone(),
            auth::auth_middleware,
        ))
}

/// `/auth` routes; only login is reachable without a session
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let session = Router::new()
        .route("/logout", post(handlers::auth::logout))
        .route("/me", get(handlers::auth::me))
        .route_layer(from_fn_with_state(
            state.auth.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/login", post(handlers::auth::login))
        .merge(session)
}

/// Full application router with request id, tracing and compression layers
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(&state))
        .nest("/auth", auth_routes(&state))
        .nest("/health", handlers::health::health_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::new(42, Some("ok".into()))).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": true, "data": 42, "message": "ok" })
        );

        let body = serde_json::to_value(ApiResponse::success("x")).unwrap();
        assert_eq!(body["message"], serde_json::Value::Null);
    }
}
