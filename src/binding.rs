//! Compiled statement bindings.
//!
//! A binding pairs one SQL template with declared parameter names and a
//! result shape, all fixed at construction and reused for every call. The
//! shape lives in the binding type: [`Execute`] reports affected rows,
//! [`QueryOne`] maps at most one row, [`QueryAll`] eagerly maps every row,
//! and [`QueryStream`] produces a forward-only lazy sequence. Whether a
//! single-row binding is scalar or structured follows from its target
//! type's [`FromRow`] implementation.
//!
//! ```rust,no_run
//! use sql_binder::prelude::*;
//!
//! # async fn demo(binder: &Binder) -> Result<(), SqlBinderError> {
//! let insert = Execute::new(
//!     "INSERT INTO stats (name, value) VALUES (#{stat.name}, #{stat.value})",
//!     &["stat"],
//! )?;
//! let stat = serde_json::json!({"name": "hits", "value": 3});
//! let affected = insert.call(binder, &[&stat]).await?;
//! # let _ = affected;
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use crate::args::{BindArg, BindEnv};
use crate::binder::Binder;
use crate::error::SqlBinderError;
use crate::mapper::{self, FromRow, RowStream};
use crate::results::ResultSet;
use crate::scope::ExecutionScope;
use crate::template::{PlaceholderStyle, Template};

/// Template plus declared parameter names, shared by every binding shape.
#[derive(Debug, Clone)]
pub(crate) struct SqlBinding {
    template: Template,
    params: Vec<String>,
}

impl SqlBinding {
    /// Parse the template and validate it against the declared parameters.
    ///
    /// A declared parameter the template never references is simply unused;
    /// a referenced root with no declared parameter is an error.
    fn new(sql: &str, params: &[&str]) -> Result<Self, SqlBinderError> {
        let template = Template::parse(sql)?;
        for path in template.paths() {
            if !params.contains(&path.root()) {
                return Err(SqlBinderError::UnknownParameter(path.to_string()));
            }
        }
        Ok(Self {
            template,
            params: params.iter().map(|p| (*p).to_string()).collect(),
        })
    }

    /// Build the render environment from positional arguments matched by
    /// declared parameter order.
    fn env<'a>(&'a self, args: &[&'a dyn BindArg]) -> Result<BindEnv<'a>, SqlBinderError> {
        if args.len() != self.params.len() {
            return Err(SqlBinderError::ArgumentMismatch(format!(
                "statement declares {} parameter(s), call supplied {}",
                self.params.len(),
                args.len()
            )));
        }
        let mut env = BindEnv::new();
        for (name, value) in self.params.iter().zip(args) {
            env = env.arg(name, *value);
        }
        Ok(env)
    }

    fn render(
        &self,
        style: PlaceholderStyle,
        env: &BindEnv<'_>,
    ) -> Result<(String, Vec<crate::types::SqlValue>), SqlBinderError> {
        self.template.render(style, env)
    }
}

/// Run one statement under the calling context's scope, or under a fresh
/// single-call scope that is auto-committed on success and rolled back on
/// failure. This is the core protocol every binding shape shares.
async fn run_query(
    binding: &SqlBinding,
    binder: &Binder,
    env: &BindEnv<'_>,
) -> Result<ResultSet, SqlBinderError> {
    if let Some(scope) = crate::scope::current() {
        let style = binder.placeholder_style()?;
        let (sql, params) = binding.render(style, env)?;
        return scope.query(&sql, &params).await;
    }
    let (scope, style) = binder.autocommit_scope().await?;
    let out = async {
        let (sql, params) = binding.render(style, env)?;
        scope.query(&sql, &params).await
    }
    .await;
    binder.settle(&scope, &out).await;
    out
}

async fn run_execute(
    binding: &SqlBinding,
    binder: &Binder,
    env: &BindEnv<'_>,
) -> Result<u64, SqlBinderError> {
    if let Some(scope) = crate::scope::current() {
        let style = binder.placeholder_style()?;
        let (sql, params) = binding.render(style, env)?;
        return scope.execute(&sql, &params).await;
    }
    let (scope, style) = binder.autocommit_scope().await?;
    let out = async {
        let (sql, params) = binding.render(style, env)?;
        scope.execute(&sql, &params).await
    }
    .await;
    binder.settle(&scope, &out).await;
    out
}

/// A bound DML statement: executes and reports the affected row count.
#[derive(Debug, Clone)]
pub struct Execute {
    inner: SqlBinding,
}

impl Execute {
    /// Compile the binding.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::TemplateSyntax`] or
    /// [`SqlBinderError::UnknownParameter`].
    pub fn new(sql: &str, params: &[&str]) -> Result<Self, SqlBinderError> {
        Ok(Self {
            inner: SqlBinding::new(sql, params)?,
        })
    }

    /// Call with positional arguments matched by declared parameter order.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, or driver errors.
    pub async fn call(
        &self,
        binder: &Binder,
        args: &[&dyn BindArg],
    ) -> Result<u64, SqlBinderError> {
        let env = self.inner.env(args)?;
        self.call_env(binder, &env).await
    }

    /// Call with a named-argument environment.
    ///
    /// # Errors
    ///
    /// Returns reference or driver errors.
    pub async fn call_env(
        &self,
        binder: &Binder,
        env: &BindEnv<'_>,
    ) -> Result<u64, SqlBinderError> {
        run_execute(&self.inner, binder, env).await
    }

    pub(crate) async fn call_scoped(
        &self,
        scope: &Arc<ExecutionScope>,
        style: PlaceholderStyle,
        args: &[&dyn BindArg],
    ) -> Result<u64, SqlBinderError> {
        let env = self.inner.env(args)?;
        let (sql, params) = self.inner.render(style, &env)?;
        scope.execute(&sql, &params).await
    }
}

/// A bound query mapping at most one row into `T`.
///
/// Zero rows map to `None`; two or more rows are an error.
pub struct QueryOne<T: FromRow> {
    inner: SqlBinding,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> QueryOne<T> {
    /// Compile the binding.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::TemplateSyntax`] or
    /// [`SqlBinderError::UnknownParameter`].
    pub fn new(sql: &str, params: &[&str]) -> Result<Self, SqlBinderError> {
        Ok(Self {
            inner: SqlBinding::new(sql, params)?,
            _marker: PhantomData,
        })
    }

    /// Call with positional arguments matched by declared parameter order.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, driver, or mapping errors.
    pub async fn call(
        &self,
        binder: &Binder,
        args: &[&dyn BindArg],
    ) -> Result<Option<T>, SqlBinderError> {
        let env = self.inner.env(args)?;
        self.call_env(binder, &env).await
    }

    /// Call with a named-argument environment.
    ///
    /// # Errors
    ///
    /// Returns reference, driver, or mapping errors.
    pub async fn call_env(
        &self,
        binder: &Binder,
        env: &BindEnv<'_>,
    ) -> Result<Option<T>, SqlBinderError> {
        let results = run_query(&self.inner, binder, env).await?;
        mapper::map_one(&results)
    }

    pub(crate) async fn call_scoped(
        &self,
        scope: &Arc<ExecutionScope>,
        style: PlaceholderStyle,
        args: &[&dyn BindArg],
    ) -> Result<Option<T>, SqlBinderError> {
        let env = self.inner.env(args)?;
        let (sql, params) = self.inner.render(style, &env)?;
        let results = scope.query(&sql, &params).await?;
        mapper::map_one(&results)
    }
}

/// A bound query eagerly mapping every row into a `Vec<T>`, in row order.
pub struct QueryAll<T: FromRow> {
    inner: SqlBinding,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> QueryAll<T> {
    /// Compile the binding.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::TemplateSyntax`] or
    /// [`SqlBinderError::UnknownParameter`].
    pub fn new(sql: &str, params: &[&str]) -> Result<Self, SqlBinderError> {
        Ok(Self {
            inner: SqlBinding::new(sql, params)?,
            _marker: PhantomData,
        })
    }

    /// Call with positional arguments matched by declared parameter order.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, driver, or mapping errors.
    pub async fn call(
        &self,
        binder: &Binder,
        args: &[&dyn BindArg],
    ) -> Result<Vec<T>, SqlBinderError> {
        let env = self.inner.env(args)?;
        self.call_env(binder, &env).await
    }

    /// Call with a named-argument environment.
    ///
    /// # Errors
    ///
    /// Returns reference, driver, or mapping errors.
    pub async fn call_env(
        &self,
        binder: &Binder,
        env: &BindEnv<'_>,
    ) -> Result<Vec<T>, SqlBinderError> {
        let results = run_query(&self.inner, binder, env).await?;
        mapper::map_all(results)
    }

    pub(crate) async fn call_scoped(
        &self,
        scope: &Arc<ExecutionScope>,
        style: PlaceholderStyle,
        args: &[&dyn BindArg],
    ) -> Result<Vec<T>, SqlBinderError> {
        let env = self.inner.env(args)?;
        let (sql, params) = self.inner.render(style, &env)?;
        let results = scope.query(&sql, &params).await?;
        mapper::map_all(results)
    }
}

/// A bound query producing a forward-only, non-restartable [`RowStream`].
///
/// Rows are fetched from the driver when the statement runs; mapping is
/// deferred until the consumer pulls each element.
pub struct QueryStream<T: FromRow> {
    inner: SqlBinding,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> QueryStream<T> {
    /// Compile the binding.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::TemplateSyntax`] or
    /// [`SqlBinderError::UnknownParameter`].
    pub fn new(sql: &str, params: &[&str]) -> Result<Self, SqlBinderError> {
        Ok(Self {
            inner: SqlBinding::new(sql, params)?,
            _marker: PhantomData,
        })
    }

    /// Call with positional arguments matched by declared parameter order.
    ///
    /// # Errors
    ///
    /// Returns argument, reference, or driver errors; per-row mapping errors
    /// surface as the stream is consumed.
    pub async fn call(
        &self,
        binder: &Binder,
        args: &[&dyn BindArg],
    ) -> Result<RowStream<T>, SqlBinderError> {
        let env = self.inner.env(args)?;
        self.call_env(binder, &env).await
    }

    /// Call with a named-argument environment.
    ///
    /// # Errors
    ///
    /// Returns reference or driver errors; per-row mapping errors surface as
    /// the stream is consumed.
    pub async fn call_env(
        &self,
        binder: &Binder,
        env: &BindEnv<'_>,
    ) -> Result<RowStream<T>, SqlBinderError> {
        let results = run_query(&self.inner, binder, env).await?;
        Ok(RowStream::new(results))
    }
}
