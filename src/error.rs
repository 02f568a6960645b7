use thiserror::Error;

#[cfg(feature = "sqlite")]
use deadpool_sqlite::rusqlite;

/// Crate-wide error type.
///
/// Template and argument errors indicate programmer mistakes and are never
/// retried. Driver errors are wrapped transparently so the original cause is
/// preserved; the active scope is rolled back before they propagate.
#[derive(Debug, Error)]
pub enum SqlBinderError {
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    #[error("Unresolved template reference '{0}'")]
    UnresolvedReference(String),

    #[error("Template references '{0}' but no such parameter is declared")]
    UnknownParameter(String),

    #[error("Argument mismatch: {0}")]
    ArgumentMismatch(String),

    #[error("No connection pool has been configured for the binder")]
    PoolNotConfigured,

    #[error("The connection pool can only be configured once")]
    PoolAlreadyConfigured,

    #[error("Blocking facade cannot be used from within an async context")]
    BlockingInAsyncContext,

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolPostgres(#[from] deadpool_postgres::PoolError),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    PoolSqlite(#[from] deadpool_sqlite::PoolError),

    #[error("SQL execution error: {0}")]
    Execution(String),

    #[error("Expected at most one row, got {0}")]
    TooManyRows(usize),

    #[error("Expected a single column, got {0}")]
    TooManyColumns(usize),

    #[error("Result mapping error: {0}")]
    Mapping(String),

    #[error("Another migration is already in progress")]
    LockContended,

    #[error("Migration '{script}' failed: {source}")]
    Revision {
        script: String,
        #[source]
        source: Box<SqlBinderError>,
    },

    #[error("Migration discovery error: {0}")]
    Discovery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl SqlBinderError {
    /// Short stable name for the error's category, used when persisting
    /// failure records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemplateSyntax(_) => "TemplateSyntax",
            Self::UnresolvedReference(_) => "UnresolvedReference",
            Self::UnknownParameter(_) => "UnknownParameter",
            Self::ArgumentMismatch(_) => "ArgumentMismatch",
            Self::PoolNotConfigured => "PoolNotConfigured",
            Self::PoolAlreadyConfigured => "PoolAlreadyConfigured",
            Self::BlockingInAsyncContext => "BlockingInAsyncContext",
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => "Postgres",
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => "Sqlite",
            #[cfg(feature = "postgres")]
            Self::PoolPostgres(_) => "PoolPostgres",
            #[cfg(feature = "sqlite")]
            Self::PoolSqlite(_) => "PoolSqlite",
            Self::Execution(_) => "Execution",
            Self::TooManyRows(_) => "TooManyRows",
            Self::TooManyColumns(_) => "TooManyColumns",
            Self::Mapping(_) => "Mapping",
            Self::LockContended => "LockContended",
            Self::Revision { .. } => "Revision",
            Self::Discovery(_) => "Discovery",
            Self::Config(_) => "Config",
            Self::Unsupported(_) => "Unsupported",
        }
    }
}
