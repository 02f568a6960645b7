//! Migration script discovery.
//!
//! Scans a directory for `.sql` files whose names match the runner's
//! ordering pattern. Lexicographic filename order is the application order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use crate::error::SqlBinderError;
use crate::scope::TxConnection;

use super::Migration;

/// A migration whose upgrade step is the contents of a `.sql` file,
/// executed as one batch inside the script's transaction.
#[derive(Debug, Clone)]
pub struct SqlScriptMigration {
    revision: String,
    path: PathBuf,
}

#[async_trait]
impl Migration for SqlScriptMigration {
    fn revision(&self) -> &str {
        &self.revision
    }

    async fn upgrade(&self, conn: &TxConnection) -> Result<(), SqlBinderError> {
        let sql = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SqlBinderError::Discovery(format!(
                "cannot read migration script {}: {e}",
                self.path.display()
            ))
        })?;
        conn.batch(&sql).await
    }
}

/// Scan `dir` for scripts matching `pattern`, sorted by filename.
///
/// # Errors
///
/// Returns [`SqlBinderError::Discovery`] when the directory cannot be read.
pub(crate) fn discover(
    dir: &Path,
    pattern: &Regex,
) -> Result<Vec<SqlScriptMigration>, SqlBinderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        SqlBinderError::Discovery(format!(
            "migration script directory {} cannot be read: {e}",
            dir.display()
        ))
    })?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| SqlBinderError::Discovery(format!("directory read error: {e}")))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) {
            continue;
        }
        let revision = name.strip_suffix(".sql").unwrap_or(name).to_string();
        scripts.push(SqlScriptMigration {
            revision,
            path: entry.path(),
        });
    }
    scripts.sort_by(|a, b| a.revision.cmp(&b.revision));
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_script(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "SELECT 1;").expect("script should be writable");
    }

    #[test]
    fn discovers_matching_scripts_in_lexicographic_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_script(dir.path(), "20260101_002_add_email.sql");
        write_script(dir.path(), "20260101_001_create_users.sql");
        write_script(dir.path(), "notes.txt");
        write_script(dir.path(), "20260101_003_seed.sql.bak");

        let pattern = Regex::new(super::super::DEFAULT_PATTERN).expect("pattern");
        let scripts = discover(dir.path(), &pattern).expect("discovery should succeed");
        let names: Vec<&str> = scripts.iter().map(Migration::revision).collect();
        assert_eq!(
            names,
            vec!["20260101_001_create_users", "20260101_002_add_email"]
        );
    }

    #[test]
    fn missing_directory_is_a_discovery_error() {
        let pattern = Regex::new(super::super::DEFAULT_PATTERN).expect("pattern");
        let err = discover(Path::new("/definitely/not/a/dir"), &pattern).unwrap_err();
        assert!(matches!(err, SqlBinderError::Discovery(_)));
    }
}
