//! API error model.

use thiserror::Error;

/// Result type used across the API layers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Business status codes carried in the response envelope.
///
/// Code `0` is success; everything else is multiplexed through the envelope
/// body with HTTP 200 unless an endpoint explicitly raises the transport
/// status.
pub mod codes {
    pub const SUCCESS: u32 = 0;
    pub const UNKNOWN_ERROR: u32 = 1;
    /// Default API error (message only).
    pub const API_ERROR: u32 = 9;

    pub const PARAMETER_INVALID: u32 = 100;
    pub const PARAMETER_MISSING: u32 = 102;
    pub const PARAMETER_INVALID_JSON: u32 = 104;
    pub const PARAMETER_INVALID_TYPE: u32 = 105;

    pub const USERNAME_INVALID: u32 = 114;
    pub const PASSWORD_INVALID: u32 = 115;
    pub const USER_NAME_EXISTS: u32 = 117;

    /// Unique constraint violation.
    pub const DATABASE_UNIQUE_VIOLATION: u32 = 200;

    pub const NOT_IMPLEMENTED: u32 = 301;
    pub const UNAUTHORIZED: u32 = 401;
    pub const NOT_ALLOW: u32 = 405;
    pub const RECORD_NOT_EXISTS: u32 = 410;
}

/// Error raised anywhere between the gateway and the data layer.
///
/// The taxonomy maps directly onto transport behavior:
/// - [`ApiError::InvalidUsage`] → HTTP 400 with a plain-text message,
/// - [`ApiError::Api`] → HTTP 200 with a nonzero envelope `code`,
/// - everything else → HTTP 500.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client sent a request the binder or an endpoint cannot accept.
    #[error("{0}")]
    InvalidUsage(String),

    /// A business failure reported through the envelope.
    ///
    /// `rollback` tells the enclosing transaction scope whether to undo the
    /// current unit of work before the error is surfaced.
    #[error("{message}")]
    Api {
        code: u32,
        message: String,
        rollback: bool,
    },

    /// Envelope data had no JSON mapping.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Anything that should never reach a client verbatim.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_usage(msg: impl Into<String>) -> Self {
        Self::InvalidUsage(msg.into())
    }

    /// Business error with the default rollback behavior (roll back).
    pub fn api(code: u32, msg: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: msg.into(),
            rollback: true,
        }
    }

    /// Business error that leaves the enclosing transaction committed.
    pub fn api_no_rollback(code: u32, msg: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: msg.into(),
            rollback: false,
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the enclosing transaction should be rolled back before this
    /// error is surfaced.
    pub fn should_rollback(&self) -> bool {
        match self {
            Self::Api { rollback, .. } => *rollback,
            _ => true,
        }
    }

    /// The business code this error carries into an envelope.
    pub fn business_code(&self) -> u32 {
        match self {
            Self::InvalidUsage(_) => codes::PARAMETER_INVALID,
            Self::Api { code, .. } => *code,
            Self::Serialization(_) | Self::Internal(_) => codes::UNKNOWN_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_error_carries_code_and_rollback() {
        let err = ApiError::api(codes::RECORD_NOT_EXISTS, "no such record");
        assert_eq!(err.business_code(), codes::RECORD_NOT_EXISTS);
        assert!(err.should_rollback());

        let err = ApiError::api_no_rollback(codes::API_ERROR, "soft failure");
        assert!(!err.should_rollback());
    }

    #[test]
    fn invalid_usage_always_rolls_back() {
        assert!(ApiError::invalid_usage("bad input").should_rollback());
    }
}
