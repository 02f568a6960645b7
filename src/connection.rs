//! Pooled connection wrapper exposing one driver surface to the rest of the
//! crate: `execute`, `query`, `batch`, and transaction control, each
//! suspending in the async execution model.

use crate::error::SqlBinderError;
use crate::results::ResultSet;
use crate::types::SqlValue;

#[cfg(feature = "sqlite")]
use crate::sqlite;

#[cfg(feature = "postgres")]
use crate::postgres;

/// A connection checked out of a [`crate::pool::DatabasePool`].
///
/// Dropping the value returns the underlying connection to its pool.
pub enum DbConnection {
    /// `PostgreSQL` client connection
    #[cfg(feature = "postgres")]
    Postgres(deadpool_postgres::Object),
    /// `SQLite` database connection
    #[cfg(feature = "sqlite")]
    Sqlite(deadpool_sqlite::Object),
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f.debug_tuple("Postgres").finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").finish(),
        }
    }
}

#[cfg(feature = "sqlite")]
async fn interact<F, R>(obj: &deadpool_sqlite::Object, f: F) -> Result<R, SqlBinderError>
where
    F: FnOnce(&mut deadpool_sqlite::rusqlite::Connection) -> Result<R, SqlBinderError>
        + Send
        + 'static,
    R: Send + 'static,
{
    obj.interact(f)
        .await
        .map_err(|e| SqlBinderError::Execution(format!("sqlite interact error: {e}")))?
}

impl DbConnection {
    /// Execute a DML statement and return the affected row count.
    ///
    /// # Errors
    ///
    /// Returns the wrapped driver error on failure.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, SqlBinderError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConnection::Postgres(obj) => postgres::execute_dml(obj, sql, params).await,
            #[cfg(feature = "sqlite")]
            DbConnection::Sqlite(obj) => {
                let sql = sql.to_owned();
                let params = sqlite::convert_params(params);
                interact(obj, move |conn| sqlite::run_dml(conn, &sql, &params)).await
            }
        }
    }

    /// Execute a query and return its result set.
    ///
    /// # Errors
    ///
    /// Returns the wrapped driver error on failure.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqlBinderError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConnection::Postgres(obj) => postgres::execute_query(obj, sql, params).await,
            #[cfg(feature = "sqlite")]
            DbConnection::Sqlite(obj) => {
                let sql = sql.to_owned();
                let params = sqlite::convert_params(params);
                interact(obj, move |conn| sqlite::run_query(conn, &sql, &params)).await
            }
        }
    }

    /// Execute a batch of semicolon-separated statements with no parameters.
    ///
    /// # Errors
    ///
    /// Returns the wrapped driver error on failure.
    pub async fn batch(&mut self, sql: &str) -> Result<(), SqlBinderError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConnection::Postgres(obj) => postgres::execute_batch(obj, sql).await,
            #[cfg(feature = "sqlite")]
            DbConnection::Sqlite(obj) => {
                let sql = sql.to_owned();
                interact(obj, move |conn| sqlite::run_batch(conn, &sql)).await
            }
        }
    }

    pub(crate) async fn begin(&mut self) -> Result<(), SqlBinderError> {
        self.batch("BEGIN").await
    }

    pub(crate) async fn commit(&mut self) -> Result<(), SqlBinderError> {
        self.batch("COMMIT").await
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), SqlBinderError> {
        self.batch("ROLLBACK").await
    }
}
