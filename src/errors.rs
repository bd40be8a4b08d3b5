use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error envelope returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "message": "Order 42 not found",
    "error": "Not Found",
    "request_id": "req-abc123xyz"
}))]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error description
    pub message: String,
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

/// Whether a database error reports a unique-constraint violation.
///
/// Drivers do not agree on how they surface the violation, so the structured
/// `SqlErr` classification is checked first and the raw message second.
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string().to_ascii_lowercase();
    [
        "unique constraint failed",
        "duplicate key",
        "unique violation",
        "23505",
        "2067",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

/// Whether a database error reports write contention rather than bad data.
///
/// SQLite fails a deferred transaction with `SQLITE_BUSY` (5) or
/// `SQLITE_BUSY_SNAPSHOT` (517) when it cannot upgrade to a write lock;
/// Postgres reports `40001` for serialization failures.
pub fn is_lock_contention(err: &DbErr) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    [
        "database is locked",
        "database table is locked",
        "sqlite_busy",
        "(code: 5)",
        "(code: 517)",
        "40001",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

impl ServiceError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::DatabaseError(err) => is_unique_violation(err),
            _ => false,
        }
    }

    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::DatabaseError(err) => is_lock_contention(err),
            _ => false,
        }
    }

    /// Unique violation or lock contention: the write lost a race and may succeed again.
    pub fn is_write_conflict(&self) -> bool {
        self.is_unique_violation() || self.is_lock_contention()
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) if self.is_write_conflict() => StatusCode::CONFLICT,
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::JwtError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::HashError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) if self.is_unique_violation() => {
                "Conflicting record already exists".to_string()
            }
            Self::DatabaseError(_) if self.is_lock_contention() => {
                "Concurrent write in progress, retry the request".to_string()
            }
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            success: false,
            message: self.response_message(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            request_id: current_request_id(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn error_response_uses_envelope_and_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("Order 3".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!payload.success);
        assert_eq!(payload.error, "Not Found");
        assert_eq!(payload.message, "Not found: Order 3");
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violation_detected_from_message() {
        let err = DbErr::Custom("UNIQUE constraint failed: orders.site_id".into());
        assert!(is_unique_violation(&err));
        let svc = ServiceError::DatabaseError(err);
        assert_eq!(svc.status_code(), StatusCode::CONFLICT);
        assert_eq!(svc.response_message(), "Conflicting record already exists");

        let other = DbErr::Custom("connection reset".into());
        assert!(!is_unique_violation(&other));
    }

    #[test]
    fn sqlite_lock_contention_is_a_conflict() {
        for message in [
            "Execution Error: error returned from database: (code: 5) database is locked",
            "Execution Error: error returned from database: (code: 517) database is locked",
        ] {
            let svc = ServiceError::DatabaseError(DbErr::Custom(message.into()));
            assert!(svc.is_lock_contention());
            assert!(!svc.is_unique_violation());
            assert!(svc.is_write_conflict());
            assert_eq!(svc.status_code(), StatusCode::CONFLICT);
        }

        let other = ServiceError::DatabaseError(DbErr::Custom("no such table: orders".into()));
        assert!(!other.is_write_conflict());
    }

    #[test]
    fn internal_details_are_hidden() {
        assert_eq!(
            ServiceError::HashError("argon2 params".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("secret sql".into())).response_message(),
            "Database error"
        );
    }
}
