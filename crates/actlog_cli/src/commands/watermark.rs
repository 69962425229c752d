//! Watermark command implementation.

use super::open_store;
use actlog_core::timed;
use std::path::Path;

/// Runs the watermark command.
pub fn run(path: &Path, kind: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let mark = timed::latest_mark(&*store, kind, name)?;
    println!("{kind} {name} {}", mark.as_u64());
    Ok(())
}
