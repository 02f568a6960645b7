//! Blocking execution model.
//!
//! The same core protocol (render, acquire, execute, map, release) driven to
//! completion on an owned runtime instead of suspending. Where the async
//! model carries the current scope in task-local storage, the blocking model
//! threads the scope handle explicitly through the transaction closure.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::args::{BindArg, BindEnv};
use crate::binder::Binder;
use crate::binding::{Execute, QueryAll, QueryOne, QueryStream};
use crate::error::SqlBinderError;
use crate::mapper::{FromRow, RowStream};
use crate::pool::DatabasePool;
use crate::results::ResultSet;
use crate::scope::TxConnection;

/// Blocking facade over [`Binder`].
///
/// Owns a single-threaded runtime; every call drives the async core to
/// completion before returning. Construct it from a plain (non-async)
/// thread.
#[derive(Debug)]
pub struct BlockingBinder {
    inner: Binder,
    runtime: Runtime,
}

impl BlockingBinder {
    /// Build the facade and its private runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::BlockingInAsyncContext`] when called from
    /// inside an async context, or a configuration error if the runtime
    /// cannot be built.
    pub fn new() -> Result<Self, SqlBinderError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SqlBinderError::BlockingInAsyncContext);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlBinderError::Config(format!("failed to build runtime: {e}")))?;
        Ok(Self {
            inner: Binder::new(),
            runtime,
        })
    }

    /// Assign the connection pool. May be called exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::PoolAlreadyConfigured`] on a second call.
    pub fn set_pool(&self, pool: DatabasePool) -> Result<(), SqlBinderError> {
        self.inner.set_pool(pool)
    }

    /// The async binder underneath, for code mixing both models.
    #[must_use]
    pub fn binder(&self) -> &Binder {
        &self.inner
    }

    /// Call a bound DML statement.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, or driver errors.
    pub fn execute(&self, binding: &Execute, args: &[&dyn BindArg]) -> Result<u64, SqlBinderError> {
        self.runtime.block_on(binding.call(&self.inner, args))
    }

    /// Call a bound single-row query.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, driver, or mapping errors.
    pub fn query_one<T: FromRow>(
        &self,
        binding: &QueryOne<T>,
        args: &[&dyn BindArg],
    ) -> Result<Option<T>, SqlBinderError> {
        self.runtime.block_on(binding.call(&self.inner, args))
    }

    /// Call a bound multi-row query.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, driver, or mapping errors.
    pub fn query_all<T: FromRow>(
        &self,
        binding: &QueryAll<T>,
        args: &[&dyn BindArg],
    ) -> Result<Vec<T>, SqlBinderError> {
        self.runtime.block_on(binding.call(&self.inner, args))
    }

    /// Call a bound streaming query. The returned stream is a plain
    /// iterator; rows were fetched when the statement ran.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, or driver errors.
    pub fn query_stream<T: FromRow>(
        &self,
        binding: &QueryStream<T>,
        args: &[&dyn BindArg],
    ) -> Result<RowStream<T>, SqlBinderError> {
        self.runtime.block_on(binding.call(&self.inner, args))
    }

    /// Run `f` inside a transaction scope, committed when `f` returns `Ok`
    /// and rolled back when it returns `Err`. The scope is closed exactly
    /// once on every exit path.
    ///
    /// Statements inside `f` go through the [`BlockingTxConnection`] handle;
    /// there is no ambient scope in the blocking model.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error after rollback, or pool/driver errors from scope
    /// management.
    pub fn transaction<R, F>(&self, f: F) -> Result<R, SqlBinderError>
    where
        F: FnOnce(&BlockingTxConnection<'_>) -> Result<R, SqlBinderError>,
    {
        let (scope, style) = self.runtime.block_on(self.inner.transaction_scope())?;
        let handle = BlockingTxConnection {
            tx: TxConnection::new(Arc::clone(&scope), style),
            runtime: &self.runtime,
        };
        let out = f(&handle);
        match out {
            Ok(value) => {
                self.runtime.block_on(scope.finish(true))?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = self.runtime.block_on(scope.finish(false)) {
                    tracing::warn!(%rollback_error, "rollback after transaction error failed");
                }
                Err(error)
            }
        }
    }
}

/// Blocking counterpart of [`TxConnection`]: the explicitly threaded scope
/// handle for statements inside a blocking transaction.
pub struct BlockingTxConnection<'rt> {
    tx: TxConnection,
    runtime: &'rt Runtime,
}

impl BlockingTxConnection<'_> {
    /// Render and execute a templated DML statement.
    ///
    /// # Errors
    ///
    /// Returns template, reference, or driver errors.
    pub fn execute(&self, sql_template: &str, env: &BindEnv<'_>) -> Result<u64, SqlBinderError> {
        self.runtime.block_on(self.tx.execute(sql_template, env))
    }

    /// Render and execute a templated query.
    ///
    /// # Errors
    ///
    /// Returns template, reference, or driver errors.
    pub fn query(
        &self,
        sql_template: &str,
        env: &BindEnv<'_>,
    ) -> Result<ResultSet, SqlBinderError> {
        self.runtime.block_on(self.tx.query(sql_template, env))
    }

    /// Execute a batch of plain statements.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub fn batch(&self, sql: &str) -> Result<(), SqlBinderError> {
        self.runtime.block_on(self.tx.batch(sql))
    }

    /// Call a bound DML statement inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, or driver errors.
    pub fn call_execute(
        &self,
        binding: &Execute,
        args: &[&dyn BindArg],
    ) -> Result<u64, SqlBinderError> {
        self.runtime
            .block_on(binding.call_scoped(self.tx.scope(), self.tx.style(), args))
    }

    /// Call a bound single-row query inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, driver, or mapping errors.
    pub fn call_query_one<T: FromRow>(
        &self,
        binding: &QueryOne<T>,
        args: &[&dyn BindArg],
    ) -> Result<Option<T>, SqlBinderError> {
        self.runtime
            .block_on(binding.call_scoped(self.tx.scope(), self.tx.style(), args))
    }

    /// Call a bound multi-row query inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, driver, or mapping errors.
    pub fn call_query_all<T: FromRow>(
        &self,
        binding: &QueryAll<T>,
        args: &[&dyn BindArg],
    ) -> Result<Vec<T>, SqlBinderError> {
        self.runtime
            .block_on(binding.call_scoped(self.tx.scope(), self.tx.style(), args))
    }

    /// Commit work done so far and continue in a fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub fn commit(&self) -> Result<(), SqlBinderError> {
        self.runtime.block_on(self.tx.commit())
    }

    /// Discard work done so far and continue in a fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub fn rollback(&self) -> Result<(), SqlBinderError> {
        self.runtime.block_on(self.tx.rollback())
    }
}
