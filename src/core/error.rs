//! Typed error handling for crudkit
//!
//! Every failure that can leave a generated endpoint is a [`CrudError`].
//! Handlers match on the variants they care about and everything renders to
//! a JSON body `{ code, message, details? }` with the matching HTTP status.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: input schema violations (400)
//! - [`RequestError`]: malformed or refused requests raised by handlers and hooks
//! - [`EntityError`]: missing records (404)
//! - [`StorageError`]: data-store failures, propagated unchanged
//! - [`QueryError`]: list-query parameters the engine refuses to run with
//! - [`ConfigError`]: configuration loading and validation
//!
//! # Example
//!
//! ```rust,ignore
//! async fn find_user(store: &UsersTable, id: i64) -> CrudResult<User> {
//!     store.get(id).await?.ok_or_else(|| {
//!         EntityError::NotFound {
//!             entity_type: "user".to_string(),
//!             id: id.to_string(),
//!         }
//!         .into()
//!     })
//! }
//! ```

use crate::core::schema::Violations;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Message returned to callers when a response fails its schema
pub const INVALID_RESPONSE_MESSAGE: &str = "The server returned an invalid response format.";

/// Message returned to callers when a handler fails unexpectedly
pub const UNEXPECTED_ERROR_MESSAGE: &str =
    "An unexpected error occurred during request processing.";

/// The main error type for crudkit
#[derive(Debug)]
pub enum CrudError {
    /// Entity lookups that found nothing
    Entity(EntityError),

    /// Input validation failures
    Validation(ValidationError),

    /// Requests refused by a handler or hook
    Request(RequestError),

    /// Data-store failures
    Storage(StorageError),

    /// Table query parameters that cannot be honored
    Query(QueryError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal error with a caller-safe message
    Internal(String),

    /// Any failure without a structured classification.
    ///
    /// The validation wrapper logs the cause and replaces it with a generic
    /// [`CrudError::Internal`] before it reaches the caller.
    Unexpected(anyhow::Error),
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrudError::Entity(e) => write!(f, "{}", e),
            CrudError::Validation(e) => write!(f, "{}", e),
            CrudError::Request(e) => write!(f, "{}", e),
            CrudError::Storage(e) => write!(f, "{}", e),
            CrudError::Query(e) => write!(f, "{}", e),
            CrudError::Config(e) => write!(f, "{}", e),
            CrudError::Internal(msg) => write!(f, "{}", msg),
            CrudError::Unexpected(e) => write!(f, "Unexpected error: {}", e),
        }
    }
}

impl std::error::Error for CrudError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrudError::Entity(e) => Some(e),
            CrudError::Validation(e) => Some(e),
            CrudError::Request(e) => Some(e),
            CrudError::Storage(e) => Some(e),
            CrudError::Query(e) => Some(e),
            CrudError::Config(e) => Some(e),
            CrudError::Internal(_) => None,
            CrudError::Unexpected(e) => Some(&**e),
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CrudError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudError::Entity(e) => e.status_code(),
            CrudError::Validation(_) => StatusCode::BAD_REQUEST,
            CrudError::Request(e) => e.status_code(),
            CrudError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::Query(e) => e.status_code(),
            CrudError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::Entity(e) => e.error_code(),
            CrudError::Validation(_) => "VALIDATION_ERROR",
            CrudError::Request(e) => e.error_code(),
            CrudError::Storage(_) => "STORAGE_ERROR",
            CrudError::Query(e) => e.error_code(),
            CrudError::Config(_) => "CONFIG_ERROR",
            CrudError::Internal(_) | CrudError::Unexpected(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error belongs to the 4xx family
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            // the cause stays in the logs
            CrudError::Unexpected(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        };

        ErrorResponse {
            code: self.error_code().to_string(),
            message,
            details: self.details(),
        }
    }

    /// Get additional details for the error
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CrudError::Entity(EntityError::NotFound { entity_type, id }) => {
                Some(serde_json::json!({
                    "entity_type": entity_type,
                    "id": id
                }))
            }
            CrudError::Validation(ValidationError::Violations(violations)) => {
                Some(serde_json::json!({ "issues": violations }))
            }
            CrudError::Request(RequestError::InvalidParameter { name, .. }) => {
                Some(serde_json::json!({ "parameter": name }))
            }
            CrudError::Request(RequestError::PayloadTooLarge { limit }) => {
                Some(serde_json::json!({ "limit": limit }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to individual records
#[derive(Debug, Error)]
pub enum EntityError {
    /// Record was not found
    #[error("{entity_type} with id '{id}' not found")]
    NotFound { entity_type: String, id: String },
}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ENTITY_NOT_FOUND",
        }
    }
}

impl From<EntityError> for CrudError {
    fn from(err: EntityError) -> Self {
        CrudError::Entity(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more schema violations, each with its field path
    #[error("Validation Error: {0}")]
    Violations(Violations),

    /// Request body is not valid JSON
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

impl ValidationError {
    /// The structured violation list, if this error carries one
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            ValidationError::Violations(v) => Some(v),
            ValidationError::InvalidJson { .. } => None,
        }
    }
}

impl From<ValidationError> for CrudError {
    fn from(err: ValidationError) -> Self {
        CrudError::Validation(err)
    }
}

impl From<Violations> for CrudError {
    fn from(violations: Violations) -> Self {
        CrudError::Validation(ValidationError::Violations(violations))
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors raised deliberately while handling a request
#[derive(Debug, Error)]
pub enum RequestError {
    /// A path or query parameter has an unusable value
    #[error("Invalid {name} parameter: {message}")]
    InvalidParameter { name: String, message: String },

    /// Unauthorized request
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Forbidden operation
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Request body exceeds the read limit
    #[error("Request body is larger than {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RequestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidParameter { .. } => "INVALID_PARAMETER",
            RequestError::Unauthorized { .. } => "UNAUTHORIZED",
            RequestError::Forbidden { .. } => "FORBIDDEN",
            RequestError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
        }
    }
}

impl From<RequestError> for CrudError {
    fn from(err: RequestError) -> Self {
        CrudError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors reported by a data store
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected or failed an operation
    #[error("{backend} {operation} failed: {message}")]
    OperationFailed {
        backend: String,
        operation: String,
        message: String,
    },

    /// Backend not available
    #[error("Storage backend '{backend}' is unavailable")]
    Unavailable { backend: String },
}

impl From<StorageError> for CrudError {
    fn from(err: StorageError) -> Self {
        CrudError::Storage(err)
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised by the table query engine itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A page size that would divide by zero or select nothing
    #[error("Invalid page size {value}: pageSize must be a positive integer")]
    InvalidPageSize { value: i64 },

    /// The query string could not be decoded
    #[error("Malformed query string: {message}")]
    MalformedQuery { message: String },
}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::InvalidPageSize { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            QueryError::MalformedQuery { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::InvalidPageSize { .. } => "INVALID_PAGE_SIZE",
            QueryError::MalformedQuery { .. } => "MALFORMED_QUERY",
        }
    }
}

impl From<QueryError> for CrudError {
    fn from(err: QueryError) -> Self {
        CrudError::Query(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration
    #[error("Failed to parse config{}: {message}", .file.as_ref().map(|f| format!(" file '{}'", f)).unwrap_or_default())]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// An enabled collection has no configuration entry
    #[error("Collection '{collection}' is enabled but has no configuration")]
    MissingCollection { collection: String },

    /// Invalid value in configuration
    #[error("Invalid value '{value}' for field '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    #[error("IO error: {message}")]
    IoError { message: String },
}

impl From<ConfigError> for CrudError {
    fn from(err: ConfigError) -> Self {
        CrudError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        CrudError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for CrudError {
    fn from(err: std::io::Error) -> Self {
        CrudError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for CrudError {
    fn from(err: serde_yaml::Error) -> Self {
        CrudError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

/// Convert from anyhow::Error, recovering a wrapped `CrudError` when present
impl From<anyhow::Error> for CrudError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CrudError>() {
            Ok(crud_err) => crud_err,
            Err(err) => CrudError::Unexpected(err),
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for crudkit operations
pub type CrudResult<T> = Result<T, CrudError>;

// =============================================================================
// Tests
// =============================================================================
