//! # Error Handling
//!
//! Domain errors (`CoreError`, `InviteFailure`), the storage-layer
//! `RepositoryError`, and the problem+json `ApiError` rendered at the HTTP
//! edge with trace ID propagation.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Message shown for every invite failure, whatever the internal cause.
pub const INVITE_INVALID_MESSAGE: &str = "This invite is invalid or has expired";

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Extract current trace ID from the request context (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// True when the database rejected a write because of a unique constraint.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Too Many Requests")]
    TooManyRequests,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error type (SCREAMING_SNAKE_CASE)
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "VALIDATION_FAILED",
            ErrorType::Unauthorized => "UNAUTHENTICATED",
            ErrorType::Forbidden => "AUTHORIZATION_DENIED",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::TooManyRequests => "RATE_LIMITED",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

/// Internal cause of an invite failure. Never shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InviteFailure {
    #[error("invite not found")]
    NotFound,
    #[error("invite expired")]
    Expired,
    #[error("invite already used")]
    AlreadyUsed,
    #[error("caller role cannot redeem invites")]
    RoleMismatch,
    #[error("caller is already linked to the property")]
    AlreadyLinked,
}

impl InviteFailure {
    /// Label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            InviteFailure::NotFound => "not_found",
            InviteFailure::Expired => "expired",
            InviteFailure::AlreadyUsed => "already_used",
            InviteFailure::RoleMismatch => "role_mismatch",
            InviteFailure::AlreadyLinked => "already_linked",
        }
    }
}

/// Domain error taxonomy shared by every core operation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("caller is not authorized for this operation")]
    AuthorizationDenied,

    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Invite(#[from] InviteFailure),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("transaction failed: {reason}")]
    TransactionFailure { retryable: bool, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Classify a database error raised while writing: unique violations
    /// become `Conflict`, everything else stays a database error.
    pub fn from_write(error: sea_orm::DbErr, what: &str) -> Self {
        if is_unique_violation(&error) {
            CoreError::Conflict(format!("{what} already exists"))
        } else {
            CoreError::Database(error)
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            CoreError::Unauthenticated => "Authentication required".to_string(),
            CoreError::AuthorizationDenied => {
                "You are not allowed to perform this operation".to_string()
            }
            CoreError::Validation { message, .. } => message.clone(),
            CoreError::NotFound(what) => format!("{what} not found"),
            CoreError::Invite(_) => INVITE_INVALID_MESSAGE.to_string(),
            CoreError::Conflict(message) => message.clone(),
            CoreError::RateLimited { .. } => "Rate limit exceeded".to_string(),
            CoreError::TransactionFailure { .. } => {
                "The operation could not be completed, please retry".to_string()
            }
            CoreError::Database(_) => "Database error occurred".to_string(),
        }
    }
}

/// Storage-layer error returned by low-level stores and lookups.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl RepositoryError {
    pub fn database_error(error: sea_orm::DbErr) -> Self {
        RepositoryError::Database(error)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        RepositoryError::Validation(message.into())
    }
}

impl From<RepositoryError> for CoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(db_err) => CoreError::Database(db_err),
            RepositoryError::NotFound(_) => CoreError::NotFound("record"),
            RepositoryError::Validation(message) => CoreError::Validation {
                field: "request",
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        Self::new(
            error_type.status_code(),
            error_type.error_code(),
            &error_type.to_string(),
        )
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let message = error.public_message();
        match error {
            CoreError::Unauthenticated => {
                Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", &message)
            }
            CoreError::AuthorizationDenied => {
                Self::new(StatusCode::FORBIDDEN, "AUTHORIZATION_DENIED", &message)
            }
            CoreError::Validation { field, .. } => {
                validation_error(&message, json!({ "field": field }))
            }
            CoreError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", &message),
            CoreError::Invite(failure) => {
                tracing::info!(invite_failure = failure.kind(), "Invite rejected");
                Self::new(StatusCode::BAD_REQUEST, "INVITE_INVALID", &message)
            }
            CoreError::Conflict(_) => Self::new(StatusCode::CONFLICT, "CONFLICT", &message),
            CoreError::RateLimited { retry_after_secs } => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", &message)
                    .with_retry_after(retry_after_secs.max(1))
            }
            CoreError::TransactionFailure { retryable, reason } => {
                tracing::warn!(retryable, %reason, "Transaction failed");
                let error = Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSACTION_FAILED",
                    &message,
                )
                .with_details(json!({ "retryable": retryable }));
                if retryable {
                    error.with_retry_after(1)
                } else {
                    error
                }
            }
            CoreError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Record not found")
            }
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Create an unauthenticated error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg)
}

/// Create a forbidden error (403)
pub fn forbidden(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("You are not allowed to perform this operation");
    ApiError::new(StatusCode::FORBIDDEN, "AUTHORIZATION_DENIED", msg)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}
