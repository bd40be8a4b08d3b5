use crate::{config::AppConfig, ApiResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Standard success response
pub fn success_response<T: Serialize>(data: T, message: Option<String>) -> Response {
    (StatusCode::OK, Json(ApiResponse::new(data, message))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T, message: String) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::new(data, Some(message)))).into_response()
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page, clamped to the configured maximum
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Resolves `(page, per_page)` against the configured defaults
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        (self.page.unwrap_or(1).max(1), config.page_size(self.per_page))
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Free text matched against names, references or SKUs
    pub q: Option<String>,
    pub limit: Option<u64>,
}
