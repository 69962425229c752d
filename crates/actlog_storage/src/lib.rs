//! # actlog Storage
//!
//! Ordered key-value store contract and implementations for actlog.
//!
//! This crate provides the lowest-level storage abstraction. Stores are
//! **ordered byte maps**: they do not interpret keys or values, but they
//! keep keys in lexicographic order and assign a logical write clock
//! ([`DbTime`]) to timed writes.
//!
//! ## Design Principles
//!
//! - Every write is an atomic [`WriteBatch`]
//! - Range scans are lazy and page through the store without holding locks
//! - Timed writes are applied in the order of the times they were issued
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - Journal-backed persistent store with crash recovery
//!
//! ## Example
//!
//! ```rust
//! use actlog_storage::{KvStore, MemoryStore, WriteBatch};
//!
//! let store = MemoryStore::new();
//! let mut batch = WriteBatch::new();
//! batch.set(b"a".to_vec(), b"1".to_vec());
//! batch.set(b"b".to_vec(), b"2".to_vec());
//! store.apply(batch).unwrap();
//!
//! let page = store.scan_page(b"a", b"z", 10).unwrap();
//! assert_eq!(page.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod error;
mod file;
mod journal;
mod memory;
mod range;
mod store;

pub use batch::{BatchOp, WriteBatch};
pub use config::StoreConfig;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use range::RangeIter;
pub use store::{DbTime, KvStore, Timestamps, DEFAULT_PAGE_SIZE};
