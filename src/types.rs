//! Error types for Townhall
//!
//! One taxonomy for the whole crate. Validation and authorization failures
//! are produced at the registry/engine boundary; credential and token
//! failures collapse to a single `Unauthorized` so callers cannot tell
//! which check failed; datastore failures propagate as `Database`.

use hyper::StatusCode;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum TownhallError {
    /// Bad enum value, missing required field, malformed id
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing/invalid/expired credential. Deliberately carries no detail:
    /// unknown email, wrong password, role mismatch, and bad tokens are
    /// indistinguishable from the outside.
    #[error("invalid credentials")]
    Unauthorized,

    /// Role not permitted, admin pool full, email not on the allow-list
    #[error("{0}")]
    Forbidden(String),

    /// Unknown issue or identity reference
    #[error("{0}")]
    NotFound(String),

    /// Duplicate email
    #[error("{0}")]
    Conflict(String),

    /// Datastore unreachable or rejected the operation
    #[error("database error: {0}")]
    Database(String),

    /// Hashing/signing/config failures that are not the caller's fault
    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TownhallError {
    /// HTTP status for the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            TownhallError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            TownhallError::Unauthorized => StatusCode::UNAUTHORIZED,
            TownhallError::Forbidden(_) => StatusCode::FORBIDDEN,
            TownhallError::NotFound(_) => StatusCode::NOT_FOUND,
            TownhallError::Conflict(_) => StatusCode::CONFLICT,
            TownhallError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            TownhallError::Internal(_) | TownhallError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code for response bodies
    pub fn code(&self) -> &'static str {
        match self {
            TownhallError::InvalidArgument(_) => "INVALID_ARGUMENT",
            TownhallError::Unauthorized => "INVALID_CREDENTIALS",
            TownhallError::Forbidden(_) => "FORBIDDEN",
            TownhallError::NotFound(_) => "NOT_FOUND",
            TownhallError::Conflict(_) => "CONFLICT",
            TownhallError::Database(_) => "DB_UNAVAILABLE",
            TownhallError::Internal(_) | TownhallError::Io(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, TownhallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            TownhallError::InvalidArgument("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TownhallError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            TownhallError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            TownhallError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TownhallError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            TownhallError::Database("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn unauthorized_is_generic() {
        // One fixed message for every credential failure path
        assert_eq!(TownhallError::Unauthorized.to_string(), "invalid credentials");
        assert_eq!(TownhallError::Unauthorized.code(), "INVALID_CREDENTIALS");
    }
}
