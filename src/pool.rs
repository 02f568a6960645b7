//! Connection pool wrapper.
//!
//! Pool construction (URL parsing, sizing, TLS) belongs to the deadpool
//! crates; this module wraps an already-built pool so the rest of the crate
//! can stay backend-agnostic. The pool is the only resource shared across
//! execution contexts and carries its own internal synchronization.

#[cfg(feature = "postgres")]
use deadpool_postgres::Pool as PostgresPool;

#[cfg(feature = "sqlite")]
use deadpool_sqlite::Pool as SqlitePool;

use crate::connection::DbConnection;
use crate::error::SqlBinderError;
use crate::template::PlaceholderStyle;
use crate::types::DatabaseType;

/// Connection pool for database access.
#[derive(Clone)]
pub enum DatabasePool {
    /// `PostgreSQL` connection pool
    #[cfg(feature = "postgres")]
    Postgres(PostgresPool),
    /// `SQLite` connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f.debug_tuple("Postgres").finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").finish(),
        }
    }
}

impl DatabasePool {
    /// Wrap a `deadpool-postgres` pool.
    #[cfg(feature = "postgres")]
    #[must_use]
    pub fn postgres(pool: PostgresPool) -> Self {
        DatabasePool::Postgres(pool)
    }

    /// Wrap a `deadpool-sqlite` pool.
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sqlite(pool: SqlitePool) -> Self {
        DatabasePool::Sqlite(pool)
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    #[must_use]
    pub(crate) fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(_) => PlaceholderStyle::Postgres,
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(_) => PlaceholderStyle::Sqlite,
        }
    }

    /// Check a connection out of the pool, suspending while it is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the wrapped pool error when checkout fails.
    pub async fn checkout(&self) -> Result<DbConnection, SqlBinderError> {
        match self {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(pool) => {
                let conn = pool.get().await.map_err(SqlBinderError::PoolPostgres)?;
                Ok(DbConnection::Postgres(conn))
            }
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(pool) => {
                let conn = pool.get().await.map_err(SqlBinderError::PoolSqlite)?;
                Ok(DbConnection::Sqlite(conn))
            }
        }
    }

    /// Close the pool, draining outstanding connections at shutdown.
    pub fn dispose(&self) {
        match self {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(pool) => pool.close(),
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(pool) => pool.close(),
        }
    }
}
