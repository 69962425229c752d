//! Show command implementation.

use super::{encode_key, open_store, print_entry, EntryView};
use actlog_codec::describe;
use actlog_core::ActionLog;
use std::path::Path;

/// Runs the show command.
pub fn run(
    path: &Path,
    kind: &str,
    key: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = ActionLog::new(open_store(path)?);
    let key = encode_key(key);
    let entry = log
        .get(kind, &key)?
        .ok_or_else(|| format!("No {kind} action with key {}", describe(&key)))?;
    let view = EntryView::from(&entry);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        _ => {
            print_entry(&view);
        }
    }

    Ok(())
}
