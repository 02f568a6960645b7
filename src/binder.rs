//! The binder: owns the pool slot and the transaction entry point.

use std::sync::Arc;
use std::sync::OnceLock;

use crate::error::SqlBinderError;
use crate::pool::DatabasePool;
use crate::scope::{self, ExecutionScope, TxConnection};
use crate::template::PlaceholderStyle;

/// Composes the template engine, scope manager, and result mapper behind
/// bound statements.
///
/// A binder is constructed once, given its pool once, and then shared
/// freely: statement bindings borrow it at call time. Transactions opened
/// through [`Binder::transaction`] are visible to every bound call made
/// inside the transaction's call tree, so inner calls join the outer
/// transaction instead of opening their own.
#[derive(Debug, Default)]
pub struct Binder {
    pool: OnceLock<DatabasePool>,
}

impl Binder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: OnceLock::new(),
        }
    }

    /// Assign the connection pool. May be called exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::PoolAlreadyConfigured`] on a second call.
    pub fn set_pool(&self, pool: DatabasePool) -> Result<(), SqlBinderError> {
        self.pool
            .set(pool)
            .map_err(|_| SqlBinderError::PoolAlreadyConfigured)
    }

    pub(crate) fn pool(&self) -> Result<&DatabasePool, SqlBinderError> {
        self.pool.get().ok_or(SqlBinderError::PoolNotConfigured)
    }

    pub(crate) fn placeholder_style(&self) -> Result<PlaceholderStyle, SqlBinderError> {
        Ok(self.pool()?.placeholder_style())
    }

    /// Fresh single-call scope: no explicit transaction, the driver
    /// auto-commits the statement.
    pub(crate) async fn autocommit_scope(
        &self,
    ) -> Result<(Arc<ExecutionScope>, PlaceholderStyle), SqlBinderError> {
        let pool = self.pool()?;
        let conn = pool.checkout().await?;
        Ok((ExecutionScope::open(conn, false), pool.placeholder_style()))
    }

    /// Fresh transaction scope with an explicit transaction begun, for the
    /// blocking facade which threads the scope handle by hand.
    pub(crate) async fn transaction_scope(
        &self,
    ) -> Result<(Arc<ExecutionScope>, PlaceholderStyle), SqlBinderError> {
        let pool = self.pool()?;
        let mut conn = pool.checkout().await?;
        conn.begin().await?;
        Ok((ExecutionScope::open(conn, true), pool.placeholder_style()))
    }

    /// Release a single-call scope, logging rather than masking release
    /// failures so the statement's own result stays primary.
    pub(crate) async fn settle<T>(
        &self,
        scope: &Arc<ExecutionScope>,
        out: &Result<T, SqlBinderError>,
    ) {
        if let Err(error) = scope.finish(out.is_ok()).await {
            tracing::warn!(%error, "failed to release single-call scope");
        }
    }

    /// Run `f` inside a transaction scope.
    ///
    /// If the calling context already holds a scope, the call is reentrant:
    /// `f` joins the existing transaction and commit/rollback stay with the
    /// outermost caller. Otherwise a connection is checked out, a
    /// transaction begun, and the scope installed for `f`'s whole call tree;
    /// it is committed when `f` returns `Ok`, rolled back when `f` returns
    /// `Err`, and rolled back by the drop backstop if the future is
    /// cancelled. The scope is closed exactly once on every exit path.
    ///
    /// The closure receives a live [`TxConnection`] for manual statements or
    /// mid-body commit/rollback; bound statements called inside `f` pick the
    /// scope up implicitly.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error after rollback, or pool/driver errors from scope
    /// management.
    pub async fn transaction<F, Fut, R>(&self, f: F) -> Result<R, SqlBinderError>
    where
        F: FnOnce(TxConnection) -> Fut,
        Fut: Future<Output = Result<R, SqlBinderError>>,
    {
        let style = self.placeholder_style()?;
        if let Some(existing) = scope::current() {
            existing.push().await;
            let out = f(TxConnection::new(Arc::clone(&existing), style)).await;
            existing.pop().await;
            return out;
        }

        let (scope, style) = self.transaction_scope().await?;
        let tx = TxConnection::new(Arc::clone(&scope), style);
        let out = scope::enter(Arc::clone(&scope), f(tx)).await;
        match out {
            Ok(value) => {
                scope.finish(true).await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = scope.finish(false).await {
                    tracing::warn!(%rollback_error, "rollback after transaction error failed");
                }
                Err(error)
            }
        }
    }
}
