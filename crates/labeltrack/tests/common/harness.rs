//! Test harness for isolated test execution.
//!
//! Each `TestHarness` owns a temporary directory holding a SQLite database,
//! so tests can reopen the same file to check what was actually persisted.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use labeltrack::{Config, JobLifecycle, SqliteStore};

pub struct TestHarness {
    /// Kept alive so the directory outlives the store.
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("labeltrack.db");
        std::fs::create_dir_all(db_path.parent().unwrap()).expect("Failed to create data dir");
        Self {
            temp_dir,
            db_path,
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens a fresh connection to the harness database.
    pub fn lifecycle(&self) -> JobLifecycle<SqliteStore> {
        let store = SqliteStore::open(&self.db_path).expect("Failed to open database");
        JobLifecycle::from_config(store, &self.config)
    }

    /// Opens the same database under a different config.
    pub fn reopen_with(&self, config: Config) -> JobLifecycle<SqliteStore> {
        let store = SqliteStore::open(&self.db_path).expect("Failed to open database");
        JobLifecycle::from_config(store, &config)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
