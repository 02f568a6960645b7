//! Per-context transaction scoping.
//!
//! Exactly one [`ExecutionScope`] is visible to a logical execution context
//! at a time. In the async execution model the current scope rides in tokio
//! task-local storage, scoped to the transaction future: it propagates into
//! the whole call tree under that future but never laterally to unrelated
//! tasks. The blocking facade threads the scope handle explicitly instead.
//!
//! Scopes are closed by the wrapper that opened them, so releases nest in
//! strict LIFO order by construction. If a transaction future is dropped
//! with its scope still open (cancellation), the `Drop` backstop rolls the
//! connection back on a detached task.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::args::BindEnv;
use crate::connection::DbConnection;
use crate::error::SqlBinderError;
use crate::mapper::{self, FromRow};
use crate::results::ResultSet;
use crate::template::{PlaceholderStyle, Template};
use crate::types::SqlValue;

tokio::task_local! {
    static CURRENT_SCOPE: Arc<ExecutionScope>;
}

/// The scope bound to the calling context, if any.
pub(crate) fn current() -> Option<Arc<ExecutionScope>> {
    CURRENT_SCOPE.try_with(Arc::clone).ok()
}

/// Run `fut` with `scope` installed as the calling context's scope.
pub(crate) async fn enter<F>(scope: Arc<ExecutionScope>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_SCOPE.scope(scope, fut).await
}

struct ScopeState {
    conn: Option<DbConnection>,
    depth: usize,
    in_tx: bool,
    finished: bool,
}

/// Per-context record of the checked-out connection and transaction nesting
/// depth. Interior state is behind an async mutex only because statements
/// cross await points; a scope is never shared between contexts.
pub(crate) struct ExecutionScope {
    state: Mutex<ScopeState>,
}

impl ExecutionScope {
    /// Take ownership of a checked-out connection. `in_tx` records whether
    /// an explicit transaction was begun on it.
    pub(crate) fn open(conn: DbConnection, in_tx: bool) -> Arc<Self> {
        tracing::debug!(in_tx, "execution scope opened");
        Arc::new(Self {
            state: Mutex::new(ScopeState {
                conn: Some(conn),
                depth: 0,
                in_tx,
                finished: false,
            }),
        })
    }

    /// Reentrant acquisition by a nested transaction wrapper.
    pub(crate) async fn push(&self) {
        let mut state = self.state.lock().await;
        state.depth += 1;
        tracing::debug!(depth = state.depth, "nested scope acquired");
    }

    /// Release one nesting level; commit/rollback stay with the outermost
    /// wrapper.
    pub(crate) async fn pop(&self) {
        let mut state = self.state.lock().await;
        state.depth = state.depth.saturating_sub(1);
    }

    pub(crate) async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<u64, SqlBinderError> {
        let mut state = self.state.lock().await;
        let conn = active(&mut state)?;
        conn.execute(sql, params).await
    }

    pub(crate) async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, SqlBinderError> {
        let mut state = self.state.lock().await;
        let conn = active(&mut state)?;
        conn.query(sql, params).await
    }

    pub(crate) async fn batch(&self, sql: &str) -> Result<(), SqlBinderError> {
        let mut state = self.state.lock().await;
        let conn = active(&mut state)?;
        conn.batch(sql).await
    }

    /// Commit mid-transaction and immediately begin a new transaction so the
    /// scope invariant (open transaction until release) holds.
    pub(crate) async fn manual_commit(&self) -> Result<(), SqlBinderError> {
        let mut state = self.state.lock().await;
        if !state.in_tx {
            return Err(SqlBinderError::Execution(
                "manual commit outside a transaction scope".to_string(),
            ));
        }
        let conn = active(&mut state)?;
        conn.commit().await?;
        conn.begin().await
    }

    /// Roll back mid-transaction and begin a new transaction.
    pub(crate) async fn manual_rollback(&self) -> Result<(), SqlBinderError> {
        let mut state = self.state.lock().await;
        if !state.in_tx {
            return Err(SqlBinderError::Execution(
                "manual rollback outside a transaction scope".to_string(),
            ));
        }
        let conn = active(&mut state)?;
        conn.rollback().await?;
        conn.begin().await
    }

    /// Close the scope: commit (normal) or roll back, then hand the
    /// connection back to the caller. Dropping the returned connection
    /// returns it to the pool. Idempotent: a second call yields `None`.
    pub(crate) async fn finish(
        &self,
        normal: bool,
    ) -> Result<Option<DbConnection>, SqlBinderError> {
        let mut state = self.state.lock().await;
        if state.finished {
            return Ok(None);
        }
        state.finished = true;
        let Some(mut conn) = state.conn.take() else {
            return Ok(None);
        };
        if state.in_tx {
            if normal {
                conn.commit().await?;
            } else {
                conn.rollback().await?;
            }
        }
        tracing::debug!(normal, "execution scope closed");
        Ok(Some(conn))
    }
}

fn active(state: &mut ScopeState) -> Result<&mut DbConnection, SqlBinderError> {
    if state.finished {
        return Err(SqlBinderError::Execution(
            "execution scope already released".to_string(),
        ));
    }
    state
        .conn
        .as_mut()
        .ok_or_else(|| SqlBinderError::Execution("execution scope has no connection".to_string()))
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.finished {
            return;
        }
        let Some(mut conn) = state.conn.take() else {
            return;
        };
        if !state.in_tx {
            return;
        }
        // Cancellation path: the owning future was dropped with the scope
        // still open. Roll back on a detached task so the pooled connection
        // is not returned with an open transaction.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tracing::warn!("execution scope dropped while open; rolling back");
            handle.spawn(async move {
                if let Err(error) = conn.rollback().await {
                    tracing::warn!(%error, "rollback of abandoned scope failed");
                }
            });
        } else {
            tracing::warn!("execution scope dropped outside a runtime; connection discarded");
        }
    }
}

/// Live handle to an open transaction scope.
///
/// Handed to [`crate::binder::Binder::transaction`] closures and to
/// migration scripts. Statements accept the same template syntax as bound
/// statements and render through the same engine.
pub struct TxConnection {
    scope: Arc<ExecutionScope>,
    style: PlaceholderStyle,
}

impl TxConnection {
    pub(crate) fn new(scope: Arc<ExecutionScope>, style: PlaceholderStyle) -> Self {
        Self { scope, style }
    }

    pub(crate) fn scope(&self) -> &Arc<ExecutionScope> {
        &self.scope
    }

    pub(crate) fn style(&self) -> PlaceholderStyle {
        self.style
    }

    fn render(
        &self,
        sql_template: &str,
        env: &BindEnv<'_>,
    ) -> Result<(String, Vec<SqlValue>), SqlBinderError> {
        Template::parse(sql_template)?.render(self.style, env)
    }

    /// Render and execute a templated DML statement, returning rows affected.
    ///
    /// # Errors
    ///
    /// Returns template, reference, or driver errors.
    pub async fn execute(
        &self,
        sql_template: &str,
        env: &BindEnv<'_>,
    ) -> Result<u64, SqlBinderError> {
        let (sql, params) = self.render(sql_template, env)?;
        self.scope.execute(&sql, &params).await
    }

    /// Render and execute a templated query, returning the raw result set.
    ///
    /// # Errors
    ///
    /// Returns template, reference, or driver errors.
    pub async fn query(
        &self,
        sql_template: &str,
        env: &BindEnv<'_>,
    ) -> Result<ResultSet, SqlBinderError> {
        let (sql, params) = self.render(sql_template, env)?;
        self.scope.query(&sql, &params).await
    }

    /// Render and execute a templated query, mapping at most one row.
    ///
    /// # Errors
    ///
    /// Returns template, reference, driver, or mapping errors.
    pub async fn query_one<T: FromRow>(
        &self,
        sql_template: &str,
        env: &BindEnv<'_>,
    ) -> Result<Option<T>, SqlBinderError> {
        let results = self.query(sql_template, env).await?;
        mapper::map_one(&results)
    }

    /// Render and execute a templated query, mapping every row in order.
    ///
    /// # Errors
    ///
    /// Returns template, reference, driver, or mapping errors.
    pub async fn query_all<T: FromRow>(
        &self,
        sql_template: &str,
        env: &BindEnv<'_>,
    ) -> Result<Vec<T>, SqlBinderError> {
        let results = self.query(sql_template, env).await?;
        mapper::map_all(results)
    }

    /// Execute a batch of plain statements with no parameters.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub async fn batch(&self, sql: &str) -> Result<(), SqlBinderError> {
        self.scope.batch(sql).await
    }

    /// Commit work done so far and continue in a fresh transaction. The
    /// release-on-exit guarantee of the surrounding scope still applies.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub async fn commit(&self) -> Result<(), SqlBinderError> {
        self.scope.manual_commit().await
    }

    /// Discard work done so far and continue in a fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub async fn rollback(&self) -> Result<(), SqlBinderError> {
        self.scope.manual_rollback().await
    }
}
