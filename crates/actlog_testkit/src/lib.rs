//! # actlog Testkit
//!
//! Test utilities for actlog.
//!
//! This crate provides:
//! - Store fixtures, in memory and on disk with reopen support
//! - Pre-populated action logs and corpora
//! - Property-based test generators using proptest
//! - Key encoding test vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use actlog_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_log() {
//!     with_memory_log(|log| {
//!         log.begin("test", &key(&["a"]), b"run", false).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
