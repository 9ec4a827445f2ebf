//! Database configuration from the environment.

use crate::error::DbError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings, sourced from environment variables at startup.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Postgres connection string (`DATABASE_URL`). Required.
    pub url: String,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`, default 5).
    pub max_connections: u32,
}

impl DbConfig {
    /// Read configuration from the environment. A missing `DATABASE_URL` is
    /// fatal: the process must not serve traffic without a database.
    pub fn from_env() -> Result<Self, DbError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        Ok(Self {
            url,
            max_connections,
        })
    }
}
