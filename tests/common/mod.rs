#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sql_binder::DatabasePool;
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// File-backed `SQLite` pool; in-memory databases are per-connection, so a
/// shared temp file keeps all pooled connections on one database.
pub fn sqlite_pool(path: &Path, max_size: usize) -> DatabasePool {
    let mut cfg = deadpool_sqlite::Config::new(path);
    cfg.pool = Some(deadpool_sqlite::PoolConfig::new(max_size));
    let pool = cfg
        .create_pool(deadpool_sqlite::Runtime::Tokio1)
        .expect("sqlite pool should build");
    DatabasePool::sqlite(pool)
}

pub struct TestDb {
    pub pool: DatabasePool,
    _dir: TempDir,
}

pub fn test_db() -> TestDb {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = sqlite_pool(&dir.path().join("test.db"), 4);
    TestDb { pool, _dir: dir }
}

pub fn script_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().to_path_buf();
    (dir, path)
}
