//! # actlog Sync
//!
//! Watermark-driven batch pipelines over actlog watchers.
//!
//! This crate provides:
//! - Batching of a watcher's stream with at-least-once delivery
//! - The document embedding pipeline ([`DocSync`])
//! - A store-backed vector destination
//! - Cooperative cancellation and retry with exponential backoff
//!
//! ## Delivery
//!
//! A batch's outputs are written and flushed before the watcher is marked
//! past it, and the mark is persisted before the next batch starts. A
//! failure or crash can therefore repeat work but never skip it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod cancel;
mod config;
mod embed;
mod error;
mod pipeline;
mod vector;

pub use batch::{drive, drive_counted, Batcher, DriveStats};
pub use cancel::CancelToken;
pub use config::{RetryConfig, SyncConfig};
pub use embed::{EmbedDoc, Embedded, Embedder, Vector};
pub use error::{SyncError, SyncResult};
pub use pipeline::{latest, DocSync, SyncReport, SyncStats};
pub use vector::{StoreVectorDb, VectorBatch, VectorDb};
