//! # actlog Core
//!
//! Durable action log and watermark watchers for actlog.
//!
//! This crate provides:
//! - Timed key spaces: values stamped with the store's logical clock and
//!   readable in write order
//! - [`ActionLog`]: one [`Entry`] per `(kind, key)` action, with
//!   approval [`Decision`]s and a terminal outcome
//! - [`Watcher`]: a named, restart-safe position in a timed key space
//! - [`Corpus`]: a small watched document store
//! - [`Runner`]: executes approved actions and records their outcome
//!
//! ## Example
//!
//! ```
//! use actlog_core::ActionLog;
//! use actlog_codec::{encode, Value};
//! use actlog_storage::{DbTime, MemoryStore};
//! use std::sync::Arc;
//!
//! let log = ActionLog::new(Arc::new(MemoryStore::new()));
//! log.begin("post", &encode(&[Value::Uint(1)]), b"{}", false).unwrap();
//! log.begin("post", &encode(&[Value::Uint(2)]), b"{}", false).unwrap();
//!
//! let mut watcher = log.watcher("audit").unwrap();
//! for item in watcher.recent() {
//!     let item = item.unwrap();
//!     watcher.mark_old(item.cursor);
//! }
//! watcher.flush().unwrap();
//! assert_eq!(watcher.latest(), DbTime::new(2));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
mod docs;
mod error;
pub mod timed;
mod watcher;

pub use action::{
    ActionExecutor, ActionLog, Decision, Entry, EntryStatus, ExecutorError, RunReport, Runner,
    ACTION_KIND,
};
pub use docs::{Corpus, Doc, Docs, DOC_KIND};
pub use error::{CoreError, CoreResult};
pub use watcher::{Cursor, Decoder, Recent, Watched, Watcher};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
