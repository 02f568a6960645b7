//! Forward-only migration runner.
//!
//! Pending revisions are applied in lexicographic order, each inside its own
//! transaction scope, with outcomes appended to a tracking table. An
//! advisory lock row keeps concurrent runners out; the lock carries a
//! started-at timestamp so a crashed runner's lock expires instead of
//! wedging future runs.
//!
//! ```rust,no_run
//! use sql_binder::migrate::Migrator;
//! # async fn demo(pool: sql_binder::DatabasePool) -> Result<(), sql_binder::SqlBinderError> {
//! let report = Migrator::new(pool)
//!     .scripts_dir("migrations")
//!     .upgrade()
//!     .await?;
//! println!("applied {} revision(s)", report.applied.len());
//! # Ok(())
//! # }
//! ```

mod dialect;
mod discovery;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;

use crate::args::BindEnv;
use crate::connection::DbConnection;
use crate::error::SqlBinderError;
use crate::pool::DatabasePool;
use crate::scope::{ExecutionScope, TxConnection};
use crate::template::{PlaceholderStyle, Template};
use crate::types::SqlValue;

pub use discovery::SqlScriptMigration;

use dialect::MigrationDialect;

/// Default filename pattern: date, sequence number, description.
pub const DEFAULT_PATTERN: &str = r"^\d{8}_\d{3}_.+\.sql$";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15 * 60);

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PATTERN).expect("default migration pattern is valid"));

const SELECT_REVISION_RECORDS: &str = "SELECT revision_name, applied_at, status, error_type, \
     error_message FROM sql_binder_revisions ORDER BY id";

/// One versioned upgrade step.
///
/// `.sql` files discovered on disk become [`SqlScriptMigration`]s; code
/// migrations implement this trait directly and register via
/// [`Migrator::migration`]. The connection handle exposes the same templated
/// `execute`/`query` surface bound statements use.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Revision name; lexicographic order across all migrations is the
    /// application order.
    fn revision(&self) -> &str;

    /// Apply this revision. Runs inside a dedicated transaction that is
    /// committed on `Ok` and rolled back on `Err`.
    async fn upgrade(&self, conn: &TxConnection) -> Result<(), SqlBinderError>;
}

/// Terminal outcome of one revision attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Applied,
    Failed,
}

/// One row of the append-only revision tracking table.
#[derive(Debug, Clone, Serialize)]
pub struct RevisionRecord {
    pub revision_name: String,
    pub applied_at: Option<chrono::NaiveDateTime>,
    pub status: MigrationStatus,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

/// Summary of a successful [`Migrator::upgrade`] run.
#[derive(Debug, Clone, Default)]
pub struct UpgradeReport {
    /// Revisions applied by this run, in order.
    pub applied: Vec<String>,
}

/// Sequentially applies pending migrations under an exclusive lock.
pub struct Migrator {
    pool: DatabasePool,
    scripts_dir: Option<PathBuf>,
    pattern: Regex,
    reattempt_failed: bool,
    lock_timeout: Duration,
    registered: Vec<Arc<dyn Migration>>,
}

impl Migrator {
    /// Build a runner with the default pattern, a 15 minute lock expiry, and
    /// failed revisions blocking until an operator intervenes.
    #[must_use]
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            scripts_dir: None,
            pattern: DEFAULT_REGEX.clone(),
            reattempt_failed: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            registered: Vec::new(),
        }
    }

    /// Directory scanned for `.sql` migration scripts.
    #[must_use]
    pub fn scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = Some(dir.into());
        self
    }

    /// Override the filename ordering pattern.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::Config`] when the pattern is not a valid
    /// regular expression.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, SqlBinderError> {
        self.pattern = Regex::new(pattern)
            .map_err(|e| SqlBinderError::Config(format!("invalid migration pattern: {e}")))?;
        Ok(self)
    }

    /// Whether a previously failed revision is treated as pending again.
    /// Off by default: a failed revision blocks the batch until resolved.
    #[must_use]
    pub fn reattempt_failed(mut self, reattempt: bool) -> Self {
        self.reattempt_failed = reattempt;
        self
    }

    /// How old an in-progress lock row must be before it is considered
    /// abandoned and cleared.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Register a code migration. Its revision name must match the filename
    /// pattern (minus the `.sql` suffix) and sorts together with scripts.
    #[must_use]
    pub fn migration(mut self, migration: Arc<dyn Migration>) -> Self {
        self.registered.push(migration);
        self
    }

    /// Apply all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::LockContended`] when another runner holds
    /// the lock, [`SqlBinderError::Revision`] when a script fails (the
    /// remaining batch is halted and the lock released), and discovery,
    /// configuration, or driver errors.
    pub async fn upgrade(&self) -> Result<UpgradeReport, SqlBinderError> {
        let dialect = dialect::for_type(self.pool.database_type());
        let style = self.pool.placeholder_style();
        let mut conn = self.pool.checkout().await?;
        conn.batch(dialect.bootstrap()).await?;

        let migrations = self.collect()?;
        let (applied, failed) = load_history(&mut conn, dialect).await?;
        let pending: Vec<&Arc<dyn Migration>> = migrations
            .iter()
            .filter(|m| !applied.contains(m.revision()))
            .collect();
        if pending.is_empty() {
            tracing::debug!("no pending migrations");
            return Ok(UpgradeReport::default());
        }
        if !self.reattempt_failed {
            if let Some(blocked) = pending.iter().find(|m| failed.contains(m.revision())) {
                return Err(SqlBinderError::Revision {
                    script: blocked.revision().to_string(),
                    source: Box::new(SqlBinderError::Config(
                        "revision failed in an earlier run; resolve it manually or enable \
                         reattempt_failed"
                            .to_string(),
                    )),
                });
            }
        }

        self.acquire_lock(&mut conn, dialect, style, &pending).await?;
        let outcome = self.apply_pending(conn, dialect, style, &pending).await;
        match &outcome {
            Ok(report) => {
                tracing::info!(applied = report.applied.len(), "migrations complete")
            }
            Err(error) => tracing::warn!(%error, "migration run halted"),
        }
        outcome
    }

    /// Read the revision history without applying anything.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub async fn status(&self) -> Result<Vec<RevisionRecord>, SqlBinderError> {
        let dialect = dialect::for_type(self.pool.database_type());
        let mut conn = self.pool.checkout().await?;
        conn.batch(dialect.bootstrap()).await?;
        let results = conn.query(SELECT_REVISION_RECORDS, &[]).await?;
        let mut records = Vec::with_capacity(results.len());
        for row in results.rows() {
            let name = row
                .get("revision_name")
                .and_then(|v| v.as_text().map(ToString::to_string))
                .unwrap_or_default();
            let status = match row.get("status").and_then(SqlValue::as_text) {
                Some("applied") => MigrationStatus::Applied,
                _ => MigrationStatus::Failed,
            };
            records.push(RevisionRecord {
                revision_name: name,
                applied_at: row.get("applied_at").and_then(SqlValue::as_timestamp),
                status,
                error_type: row
                    .get("error_type")
                    .and_then(|v| v.as_text().map(ToString::to_string)),
                error_message: row
                    .get("error_message")
                    .and_then(|v| v.as_text().map(ToString::to_string)),
            });
        }
        Ok(records)
    }

    /// Merge discovered scripts with registered code migrations.
    fn collect(&self) -> Result<Vec<Arc<dyn Migration>>, SqlBinderError> {
        let mut all: Vec<Arc<dyn Migration>> = Vec::new();
        if let Some(dir) = &self.scripts_dir {
            for script in discovery::discover(dir, &self.pattern)? {
                all.push(Arc::new(script));
            }
        }
        for migration in &self.registered {
            let as_file = format!("{}.sql", migration.revision());
            if !self.pattern.is_match(&as_file) {
                return Err(SqlBinderError::Config(format!(
                    "registered migration '{}' does not match the ordering pattern",
                    migration.revision()
                )));
            }
            all.push(Arc::clone(migration));
        }
        all.sort_by(|a, b| a.revision().cmp(b.revision()));
        let mut seen = HashSet::new();
        for migration in &all {
            if !seen.insert(migration.revision().to_string()) {
                return Err(SqlBinderError::Discovery(format!(
                    "duplicate migration revision: {}",
                    migration.revision()
                )));
            }
        }
        Ok(all)
    }

    async fn acquire_lock(
        &self,
        conn: &mut DbConnection,
        dialect: &dyn MigrationDialect,
        style: PlaceholderStyle,
        pending: &[&Arc<dyn Migration>],
    ) -> Result<(), SqlBinderError> {
        let stale = chrono::Duration::from_std(self.lock_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        let cutoff = lock_cutoff(&self.pool, Utc::now().naive_utc() - stale);
        let env = BindEnv::new().arg("cutoff", &cutoff);
        run_templated(conn, style, dialect.clear_stale_lock(), &env).await?;
        run_templated(conn, style, dialect.delete_completed_state(), &BindEnv::new()).await?;

        let target = pending
            .last()
            .map(|m| m.revision().to_string())
            .unwrap_or_default();
        let env = BindEnv::new().arg("target_revision", &target);
        let acquired = run_templated(conn, style, dialect.acquire_lock(), &env).await?;
        if acquired == 0 {
            tracing::warn!("migration lock is held by another runner");
            return Err(SqlBinderError::LockContended);
        }
        tracing::debug!(target = %target, "migration lock acquired");
        Ok(())
    }

    async fn apply_pending(
        &self,
        mut conn: DbConnection,
        dialect: &dyn MigrationDialect,
        style: PlaceholderStyle,
        pending: &[&Arc<dyn Migration>],
    ) -> Result<UpgradeReport, SqlBinderError> {
        let mut report = UpgradeReport::default();
        for migration in pending {
            let revision = migration.revision().to_string();
            tracing::debug!(revision = %revision, "applying migration");

            conn.begin().await?;
            let scope = ExecutionScope::open(conn, true);
            let tx = TxConnection::new(Arc::clone(&scope), style);
            let step = match migration.upgrade(&tx).await {
                Ok(()) => {
                    record_outcome(&scope, dialect, style, &revision, "applied", None).await
                }
                Err(error) => Err(error),
            };
            drop(tx);
            conn = match scope.finish(step.is_ok()).await {
                Ok(Some(restored)) => restored,
                Ok(None) => {
                    return Err(SqlBinderError::Execution(
                        "migration connection lost".to_string(),
                    ));
                }
                Err(release_error) => {
                    return Err(SqlBinderError::Revision {
                        script: revision,
                        source: Box::new(release_error),
                    });
                }
            };

            if let Err(error) = step {
                self.record_failure(&mut conn, dialect, style, &revision, &error)
                    .await;
                return Err(SqlBinderError::Revision {
                    script: revision,
                    source: Box::new(error),
                });
            }
            report.applied.push(revision);
        }

        let count = i64::try_from(report.applied.len()).unwrap_or(i64::MAX);
        let env = BindEnv::new().arg("applied_count", &count);
        run_templated(&mut conn, style, dialect.update_state_success(), &env).await?;
        Ok(report)
    }

    /// Best-effort failure bookkeeping: the script error is what the caller
    /// must see, so recording errors are only logged.
    async fn record_failure(
        &self,
        conn: &mut DbConnection,
        dialect: &dyn MigrationDialect,
        style: PlaceholderStyle,
        revision: &str,
        error: &SqlBinderError,
    ) {
        let error_type = error.kind().to_string();
        let message = error.to_string();

        let name = revision.to_string();
        let status = "failed".to_string();
        let env = BindEnv::new()
            .arg("revision_name", &name)
            .arg("status", &status)
            .arg("error_type", &error_type)
            .arg("error_message", &message);
        if let Err(record_error) =
            run_templated(conn, style, dialect.insert_revision(), &env).await
        {
            tracing::warn!(%record_error, "failed to record failed revision");
        }

        let env = BindEnv::new()
            .arg("error_type", &error_type)
            .arg("error_message", &message);
        if let Err(record_error) =
            run_templated(conn, style, dialect.update_state_error(), &env).await
        {
            tracing::warn!(%record_error, "failed to release migration lock after error");
        }
    }
}

async fn record_outcome(
    scope: &ExecutionScope,
    dialect: &dyn MigrationDialect,
    style: PlaceholderStyle,
    revision: &str,
    status: &str,
    error_message: Option<&str>,
) -> Result<(), SqlBinderError> {
    let name = revision.to_string();
    let status = status.to_string();
    let error_type: Option<String> = None;
    let message: Option<String> = error_message.map(ToString::to_string);
    let env = BindEnv::new()
        .arg("revision_name", &name)
        .arg("status", &status)
        .arg("error_type", &error_type)
        .arg("error_message", &message);
    let (sql, params) = Template::parse(dialect.insert_revision())?.render(style, &env)?;
    scope.execute(&sql, &params).await.map(|_| ())
}

async fn run_templated(
    conn: &mut DbConnection,
    style: PlaceholderStyle,
    sql_template: &str,
    env: &BindEnv<'_>,
) -> Result<u64, SqlBinderError> {
    let (sql, params) = Template::parse(sql_template)?.render(style, env)?;
    conn.execute(&sql, &params).await
}

async fn load_history(
    conn: &mut DbConnection,
    dialect: &dyn MigrationDialect,
) -> Result<(HashSet<String>, HashSet<String>), SqlBinderError> {
    let results = conn.query(dialect.select_revisions(), &[]).await?;
    let mut applied = HashSet::new();
    let mut with_failure = HashSet::new();
    for row in results.rows() {
        let Some(name) = row.get("revision_name").and_then(SqlValue::as_text) else {
            continue;
        };
        match row.get("status").and_then(SqlValue::as_text) {
            Some("applied") => {
                applied.insert(name.to_string());
            }
            _ => {
                with_failure.insert(name.to_string());
            }
        }
    }
    let failed: HashSet<String> = with_failure.difference(&applied).cloned().collect();
    Ok((applied, failed))
}

/// The lock cutoff in the storage form the backend's state table uses:
/// text for `SQLite`, a native timestamp for `PostgreSQL`.
fn lock_cutoff(pool: &DatabasePool, cutoff: chrono::NaiveDateTime) -> SqlValue {
    match pool.database_type() {
        #[cfg(feature = "postgres")]
        crate::types::DatabaseType::Postgres => SqlValue::Timestamp(cutoff),
        #[cfg(feature = "sqlite")]
        crate::types::DatabaseType::Sqlite => {
            SqlValue::Text(cutoff.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
        }
    }
}
