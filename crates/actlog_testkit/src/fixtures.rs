//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up stores, logs, and corpora
//! for tests.

use actlog_codec::KeyEncoder;
use actlog_core::{ActionLog, Corpus};
use actlog_storage::{FileStore, MemoryStore, StoreConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Encodes `parts` as a tuple of strings.
pub fn key(parts: &[&str]) -> Vec<u8> {
    parts
        .iter()
        .fold(KeyEncoder::new(), |enc, part| enc.str(part))
        .into_bytes()
}

/// Creates an empty in-memory store.
pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// A temporary directory for file stores, removed on drop.
///
/// The directory outlives any store opened in it, so a test can drop a
/// store and open it again to simulate a restart.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates a new temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens the store in this directory with the default configuration.
    pub fn open(&self) -> Arc<FileStore> {
        self.open_with(StoreConfig::default())
    }

    /// Opens the store in this directory with `config`.
    pub fn open_with(&self, config: StoreConfig) -> Arc<FileStore> {
        Arc::new(FileStore::open(self.path(), config).expect("Failed to open file store"))
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with an action log over a fresh in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use actlog_testkit::{key, with_memory_log};
///
/// #[test]
/// fn my_test() {
///     with_memory_log(|log| {
///         log.begin("test", &key(&["a"]), b"run", false).unwrap();
///     });
/// }
/// ```
pub fn with_memory_log<F, R>(f: F) -> R
where
    F: FnOnce(&ActionLog<MemoryStore>) -> R,
{
    let log = ActionLog::new(memory_store());
    f(&log)
}

/// Runs a test with an action log over a file store in a temporary directory.
pub fn with_file_log<F, R>(f: F) -> R
where
    F: FnOnce(&ActionLog<FileStore>, &Path) -> R,
{
    let dir = TestDir::new();
    let log = ActionLog::new(dir.open());
    f(&log, dir.path())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Action kind used by populated logs.
    pub const TEST_KIND: &str = "test";

    /// Creates a log with `count` actions of kind [`TEST_KIND`].
    ///
    /// Keys are `("k000",)`, `("k001",)`, and so on. Every third action
    /// requires approval.
    pub fn populated_log(count: usize) -> ActionLog<MemoryStore> {
        let log = ActionLog::new(memory_store());
        for i in 0..count {
            let k = key(&[&format!("k{i:03}")]);
            let action = format!("action {i}").into_bytes();
            log.begin(TEST_KIND, &k, &action, i % 3 == 0)
                .expect("Failed to begin action");
        }
        log
    }

    /// Creates a corpus with `count` documents `doc000`, `doc001`, ...
    pub fn populated_corpus(count: usize) -> Corpus<MemoryStore> {
        let corpus = Corpus::new(memory_store());
        for i in 0..count {
            corpus
                .add(&format!("doc{i:03}"), &format!("Title {i}"), &format!("text of doc {i}"))
                .expect("Failed to add document");
        }
        corpus
    }
}
