//! Per-backend DDL and templated DML for the migration tracking tables.

use crate::types::DatabaseType;

/// SQL the runner needs, specialized where backends differ. Statements with
/// `#{...}` references render through the regular template engine.
pub(crate) trait MigrationDialect: Send + Sync {
    /// Idempotent setup executed before every run: tracking tables plus any
    /// session pragmas the backend wants.
    fn bootstrap(&self) -> &'static str;

    /// Insert the advisory lock row; must affect zero rows when another
    /// in-progress row exists.
    fn acquire_lock(&self) -> &'static str;

    fn select_revisions(&self) -> &'static str {
        "SELECT revision_name, status FROM sql_binder_revisions ORDER BY id"
    }

    fn insert_revision(&self) -> &'static str {
        "INSERT INTO sql_binder_revisions (revision_name, status, error_type, error_message) \
         VALUES (#{revision_name}, #{status}, #{error_type}, #{error_message})"
    }

    fn delete_completed_state(&self) -> &'static str {
        "DELETE FROM sql_binder_state WHERE status != 'in_progress'"
    }

    fn clear_stale_lock(&self) -> &'static str {
        "DELETE FROM sql_binder_state WHERE status = 'in_progress' AND started_at < #{cutoff}"
    }

    fn update_state_success(&self) -> &'static str;

    fn update_state_error(&self) -> &'static str;
}

#[cfg(feature = "sqlite")]
struct SqliteDialect;

#[cfg(feature = "sqlite")]
impl MigrationDialect for SqliteDialect {
    fn bootstrap(&self) -> &'static str {
        "PRAGMA busy_timeout = 5000;\n\
         CREATE TABLE IF NOT EXISTS sql_binder_revisions (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         revision_name TEXT NOT NULL, \
         applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now')), \
         status TEXT NOT NULL, \
         error_type TEXT, \
         error_message TEXT);\n\
         CREATE TABLE IF NOT EXISTS sql_binder_state (\
         id INTEGER PRIMARY KEY CHECK (id = 1), \
         status TEXT NOT NULL, \
         started_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now')), \
         completed_at TEXT, \
         target_revision TEXT NOT NULL, \
         applied_count INTEGER NOT NULL DEFAULT 0, \
         error_type TEXT, \
         error_message TEXT);"
    }

    fn acquire_lock(&self) -> &'static str {
        "INSERT OR IGNORE INTO sql_binder_state (id, status, target_revision) \
         SELECT 1, 'in_progress', #{target_revision} \
         WHERE NOT EXISTS (SELECT 1 FROM sql_binder_state WHERE status = 'in_progress')"
    }

    fn update_state_success(&self) -> &'static str {
        "UPDATE sql_binder_state SET \
         status = 'success', \
         completed_at = strftime('%Y-%m-%dT%H:%M:%f', 'now'), \
         applied_count = #{applied_count} \
         WHERE id = 1"
    }

    fn update_state_error(&self) -> &'static str {
        "UPDATE sql_binder_state SET \
         status = 'error', \
         completed_at = strftime('%Y-%m-%dT%H:%M:%f', 'now'), \
         error_type = #{error_type}, \
         error_message = #{error_message} \
         WHERE id = 1"
    }
}

#[cfg(feature = "postgres")]
struct PostgresDialect;

#[cfg(feature = "postgres")]
impl MigrationDialect for PostgresDialect {
    fn bootstrap(&self) -> &'static str {
        "CREATE TABLE IF NOT EXISTS sql_binder_revisions (\
         id BIGSERIAL PRIMARY KEY, \
         revision_name TEXT NOT NULL, \
         applied_at TIMESTAMP NOT NULL DEFAULT (now() AT TIME ZONE 'utc'), \
         status TEXT NOT NULL, \
         error_type TEXT, \
         error_message TEXT);\n\
         CREATE TABLE IF NOT EXISTS sql_binder_state (\
         id INTEGER PRIMARY KEY CHECK (id = 1), \
         status TEXT NOT NULL, \
         started_at TIMESTAMP NOT NULL DEFAULT (now() AT TIME ZONE 'utc'), \
         completed_at TIMESTAMP, \
         target_revision TEXT NOT NULL, \
         applied_count INTEGER NOT NULL DEFAULT 0, \
         error_type TEXT, \
         error_message TEXT);"
    }

    fn acquire_lock(&self) -> &'static str {
        "INSERT INTO sql_binder_state (id, status, target_revision) \
         SELECT 1, 'in_progress', #{target_revision} \
         WHERE NOT EXISTS (SELECT 1 FROM sql_binder_state WHERE status = 'in_progress') \
         ON CONFLICT (id) DO NOTHING"
    }

    fn update_state_success(&self) -> &'static str {
        "UPDATE sql_binder_state SET \
         status = 'success', \
         completed_at = now() AT TIME ZONE 'utc', \
         applied_count = #{applied_count} \
         WHERE id = 1"
    }

    fn update_state_error(&self) -> &'static str {
        "UPDATE sql_binder_state SET \
         status = 'error', \
         completed_at = now() AT TIME ZONE 'utc', \
         error_type = #{error_type}, \
         error_message = #{error_message} \
         WHERE id = 1"
    }
}

pub(crate) fn for_type(db: DatabaseType) -> &'static dyn MigrationDialect {
    match db {
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => &PostgresDialect,
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => &SqliteDialect,
    }
}
