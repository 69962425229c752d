//! Entries command implementation.

use super::{open_store, EntryView};
use actlog_core::ActionLog;
use std::path::Path;
use tracing::debug;

/// Runs the entries command.
pub fn run(path: &Path, kind: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log = ActionLog::new(open_store(path)?);
    let entries = match kind {
        Some(kind) => log.scan_kind(kind),
        None => log.scan_all(),
    };
    let views = entries
        .map(|e| e.map(|e| EntryView::from(&e)))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count = views.len(), "listed entries");

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        _ => {
            print_text_output(&views);
        }
    }

    Ok(())
}

fn print_text_output(views: &[EntryView]) {
    if views.is_empty() {
        println!("No entries");
        return;
    }
    println!("{:<20} {:<32} {:<18} {:>10}", "KIND", "KEY", "STATUS", "DBTIME");
    for v in views {
        println!("{:<20} {:<32} {:<18} {:>10}", v.kind, v.key, v.status, v.db_time);
    }
    println!();
    println!("{} entries", views.len());
}
