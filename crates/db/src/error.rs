//! Data-layer error model and its mapping into the API taxonomy.

use thiserror::Error;

use gatehouse_core::{ApiError, codes};

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// `DATABASE_URL` missing from the environment. Fatal at startup.
    #[error("DATABASE_URL not set in environment")]
    MissingDatabaseUrl,

    /// A column name or column value the request supplied does not fit the
    /// table descriptor (unknown sort/criterion/projection column, value of
    /// the wrong type). Client input, surfaced as 4xx.
    #[error("{0}")]
    InvalidColumn(String),

    /// Caller input the layer rejects before touching the database
    /// (missing id, empty model). Surfaced through the business envelope.
    #[error("{0}")]
    Param(String),

    /// Restore on a table without soft-delete support.
    #[error("This table does not support restore operation")]
    RestoreUnsupported,

    /// Unique constraint violation reported by Postgres.
    #[error("duplicate key: {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DbError {
    pub fn param(msg: impl Into<String>) -> Self {
        Self::Param(msg.into())
    }

    pub fn invalid_column(msg: impl Into<String>) -> Self {
        Self::InvalidColumn(msg.into())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return DbError::UniqueViolation(db_err.message().to_string());
            }
        }
        DbError::Sqlx(err)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::MissingDatabaseUrl => ApiError::internal(err.to_string()),
            DbError::InvalidColumn(msg) => ApiError::invalid_usage(msg),
            DbError::Param(msg) => ApiError::api(codes::API_ERROR, msg),
            DbError::RestoreUnsupported => ApiError::api(codes::NOT_ALLOW, err.to_string()),
            DbError::UniqueViolation(msg) => ApiError::api(codes::DATABASE_UNIQUE_VIOLATION, msg),
            DbError::Sqlx(e) => ApiError::internal(format!("database error: {e}")),
        }
    }
}
