//! Connection pool and transaction scope.
//!
//! Every unit of work runs inside a [`DbSession`]: begin a transaction, run
//! CRUD operations against it, then [`DbSession::commit`] on success or
//! [`DbSession::rollback`] on failure. Dropping a session without
//! committing rolls back, so every exit path (success, error, or
//! cancellation) releases the connection with the transaction resolved.

use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use gatehouse_core::{ApiResponse, ApiResult};

use crate::config::DbConfig;
use crate::error::DbError;

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        tracing::info!(max_connections = config.max_connections, "database pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction-scoped session.
    pub async fn session(&self) -> Result<DbSession, DbError> {
        let tx = self.pool.begin().await?;
        Ok(DbSession { tx })
    }
}

/// One transaction-scoped unit of work.
pub struct DbSession {
    tx: Transaction<'static, Postgres>,
}

impl DbSession {
    /// Executor for statements inside this transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await.map_err(DbError::from)
    }

    pub async fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback().await.map_err(DbError::from)
    }

    /// Resolve the transaction for a finished handler call: commit on
    /// success, commit on errors that opted out of rollback, roll back
    /// otherwise.
    pub async fn finish(self, outcome: &ApiResult<ApiResponse>) -> Result<(), DbError> {
        match outcome {
            Ok(_) => self.commit().await,
            Err(err) if !err.should_rollback() => self.commit().await,
            Err(_) => self.rollback().await,
        }
    }
}
