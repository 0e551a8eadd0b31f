// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Denial responses are deliberately terse: beyond the status class the body
/// never says which internal check failed, with one exception - permission
/// names may appear in 403 messages (they are catalog vocabulary, not tenant
/// data).
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "message": self.message(),
            "code": self.error_code(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::store::StoreError> for ApiError {
    fn from(err: crate::database::store::StoreError) -> Self {
        use crate::database::store::StoreError;
        match err {
            StoreError::NotFound { entity, id } => {
                ApiError::not_found(format!("{} {} not found", entity, id))
            }
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            StoreError::Connection(_) => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("store query error: {}", sqlx_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            StoreError::Internal(msg) => {
                tracing::error!("store internal error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::services::catalog::CatalogError> for ApiError {
    fn from(err: crate::services::catalog::CatalogError) -> Self {
        use crate::services::catalog::CatalogError;
        match err {
            CatalogError::NotInitialized => {
                // Fail closed: a catalog that has not finished seeding answers no queries
                tracing::error!("catalog queried before initialization completed");
                ApiError::service_unavailable("Authorization catalog is not ready")
            }
            CatalogError::RoleNotFound(name) => {
                ApiError::not_found(format!("Role '{}' not found", name))
            }
            CatalogError::SystemRoleImmutable(name) => {
                ApiError::forbidden(format!("System role '{}' cannot be modified", name))
            }
            CatalogError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<crate::middleware::scope::ScopeViolation> for ApiError {
    fn from(err: crate::middleware::scope::ScopeViolation) -> Self {
        // A row escaping its declared scope is a domain-query bug. Log the
        // full mismatch server-side; the caller only ever sees a generic 500.
        tracing::error!(
            expected_client = err.expected_client_id,
            expected_project = err.expected_project_id,
            actual_client = ?err.actual_client_id,
            actual_project = ?err.actual_project_id,
            "tenant scope violation on fetched row"
        );
        ApiError::internal_server_error("An internal error occurred")
    }
}

impl From<crate::auth::TokenError> for ApiError {
    fn from(err: crate::auth::TokenError) -> Self {
        match err {
            // Uniform message: do not reveal malformed vs expired vs absent
            crate::auth::TokenError::Invalid(_) | crate::auth::TokenError::WrongKind => {
                ApiError::unauthorized("Authentication required")
            }
            crate::auth::TokenError::MissingSecret => {
                tracing::error!("JWT secret not configured");
                ApiError::internal_server_error("Authentication is not configured")
            }
            crate::auth::TokenError::Generation(msg) => {
                tracing::error!("token generation failed: {}", msg);
                ApiError::internal_server_error("Failed to issue token")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
