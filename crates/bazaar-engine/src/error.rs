//! # API Error Type
//!
//! The one error type every engine operation returns.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Bazaar                                 │
//! │                                                                         │
//! │  CartService / OrderService                                            │
//! │         │                                                               │
//! │         ├── CoreError ── kind() ──────────────┐                         │
//! │         │   (NotFound, InvalidInput, ...)     │                         │
//! │         │                                     ▼                         │
//! │         ├── DbError ── VersionConflict ──► ApiError { code, message }  │
//! │         │              NotFound               │                         │
//! │         │              other → logged,        │                         │
//! │         │                      generic text   │                         │
//! │         ▼                                     ▼                         │
//! │  Ok(T)                              caller branches on `code`          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! { "code": "INVALID_STATE", "message": "Refund already pending on order ..." }
//! ```

use serde::Serialize;
use thiserror::Error;

use bazaar_core::{CoreError, ErrorKind};
use bazaar_db::DbError;

/// Error returned from every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
///
/// The first five mirror the domain taxonomy; the rest come from the
/// storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown cart line, item, category or order (404)
    NotFound,

    /// Unusable input: bad quantity, variant, address, reason (400)
    InvalidInput,

    /// Operation not allowed in the entity's current state (409/422)
    InvalidState,

    /// Payment gateway declined, failed or timed out (502)
    ExternalFailure,

    /// Acting seller does not own the order (403)
    Unauthorized,

    /// Another writer saved the entity first; reload and retry (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal error (500)
    Internal,
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::InvalidInput => ErrorCode::InvalidInput,
            ErrorKind::InvalidState => ErrorCode::InvalidState,
            ErrorKind::ExternalFailure => ErrorCode::ExternalFailure,
            ErrorKind::Unauthorized => ErrorCode::Unauthorized,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts core errors to API errors. The code follows [`CoreError::kind`].
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::new(err.kind().into(), err.to_string())
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::VersionConflict { entity, id } => {
                tracing::warn!(%entity, %id, "Write lost to a concurrent update");
                ApiError::new(
                    ErrorCode::Conflict,
                    format!("{} {} was changed by another request; reload and retry", entity, id),
                )
            }
            DbError::UniqueViolation { field, .. } => {
                tracing::error!("Unique violation on {}", field);
                ApiError::new(ErrorCode::Conflict, "Record already exists")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::InvalidInput, "Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Serialization(e) | DbError::InvalidData(e) | DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::Internal, "Stored data could not be read")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for engine operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_follow_their_kind() {
        let err: ApiError = CoreError::EmptyCart.into();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let err: ApiError = CoreError::not_found("order", "o-9").into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("o-9"));
    }

    #[test]
    fn test_version_conflict_is_conflict() {
        let err: ApiError = DbError::conflict("Cart", "c-1").into();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[test]
    fn test_query_failure_hides_detail() {
        let err: ApiError = DbError::QueryFailed("near \"SELEC\": syntax error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_serialized_shape() {
        let err = ApiError::new(ErrorCode::InvalidState, "nope");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_STATE");
        assert_eq!(json["message"], "nope");
    }
}
