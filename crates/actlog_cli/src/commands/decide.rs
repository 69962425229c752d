//! Decide command implementation.

use super::{encode_key, open_store};
use actlog_core::{ActionLog, Decision};
use actlog_storage::KvStore;
use std::path::Path;
use tracing::info;

/// Runs the decide command.
pub fn run(
    path: &Path,
    kind: &str,
    key: &[String],
    name: &str,
    approve: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = ActionLog::new(open_store(path)?);
    let key = encode_key(key);
    let decision = if approve {
        Decision::approve(name)
    } else {
        Decision::deny(name)
    };
    log.add_decision(kind, &key, decision)?;
    log.store().flush()?;

    let entry = log
        .get(kind, &key)?
        .ok_or("Action disappeared after decision")?;
    info!(%kind, %name, approve, status = %entry.status(), "recorded decision");
    println!("{}", entry.status());
    Ok(())
}
