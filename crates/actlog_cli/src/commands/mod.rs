//! CLI command implementations.

pub mod decide;
pub mod entries;
pub mod show;
pub mod watermark;

use actlog_codec::{describe, KeyEncoder};
use actlog_core::Entry;
use actlog_storage::{FileStore, StoreConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opens an existing store.
pub fn open_store(path: &Path) -> Result<Arc<FileStore>, Box<dyn std::error::Error>> {
    let config = StoreConfig::new().create_if_missing(false);
    Ok(Arc::new(FileStore::open(path, config)?))
}

/// Encodes command-line key parts as a tuple of strings.
pub fn encode_key(parts: &[String]) -> Vec<u8> {
    parts
        .iter()
        .fold(KeyEncoder::new(), |enc, part| enc.str(part))
        .into_bytes()
}

fn unix_millis(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis())
}

/// A decision as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct DecisionView {
    /// Who decided.
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub time_ms: u128,
    /// True for approval.
    pub approved: bool,
}

/// An entry as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct EntryView {
    /// Action kind.
    pub kind: String,
    /// Decoded key.
    pub key: String,
    /// Lifecycle state.
    pub status: String,
    /// Action payload, as lossy UTF-8.
    pub action: String,
    /// Whether approval is required.
    pub approval_required: bool,
    /// Decisions in order.
    pub decisions: Vec<DecisionView>,
    /// Result payload, as lossy UTF-8.
    pub result: String,
    /// Error message, empty on success.
    pub error: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_ms: u128,
    /// Last modification time in milliseconds since the Unix epoch.
    pub mod_time_ms: u128,
    /// Store time of the last write.
    pub db_time: u64,
}

impl From<&Entry> for EntryView {
    fn from(e: &Entry) -> Self {
        Self {
            kind: e.kind.clone(),
            key: describe(&e.key),
            status: e.status().to_string(),
            action: String::from_utf8_lossy(&e.action).into_owned(),
            approval_required: e.approval_required,
            decisions: e
                .decisions
                .iter()
                .map(|d| DecisionView {
                    name: d.name.clone(),
                    time_ms: unix_millis(d.time),
                    approved: d.approved,
                })
                .collect(),
            result: String::from_utf8_lossy(&e.result).into_owned(),
            error: e.error.clone(),
            created_ms: unix_millis(e.created),
            mod_time_ms: unix_millis(e.mod_time),
            db_time: e.db_time.as_u64(),
        }
    }
}

/// Prints an entry in the detailed text layout.
pub fn print_entry(view: &EntryView) {
    println!("Kind:      {}", view.kind);
    println!("Key:       {}", view.key);
    println!("Status:    {}", view.status);
    println!("Action:    {}", view.action);
    println!("Approval:  {}", if view.approval_required { "required" } else { "not required" });
    for d in &view.decisions {
        let vote = if d.approved { "approve" } else { "deny" };
        println!("  {vote:<8} {} at {}ms", d.name, d.time_ms);
    }
    if !view.result.is_empty() {
        println!("Result:    {}", view.result);
    }
    if !view.error.is_empty() {
        println!("Error:     {}", view.error);
    }
    println!("Created:   {}ms", view.created_ms);
    println!("Modified:  {}ms", view.mod_time_ms);
    println!("DBTime:    {}", view.db_time);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actlog_codec::{decode, Value};
    use actlog_core::ActionLog;
    use actlog_storage::MemoryStore;

    #[test]
    fn key_parts_are_string_tuple() {
        let key = encode_key(&["a".to_string(), "7".to_string()]);
        assert_eq!(decode(&key).unwrap(), vec![Value::from("a"), Value::from("7")]);
    }

    #[test]
    fn entry_view_fields() {
        let log = ActionLog::new(Arc::new(MemoryStore::new()));
        let key = encode_key(&["issue".to_string()]);
        log.begin("post", &key, b"hello", true).unwrap();
        let entry = log.get("post", &key).unwrap().unwrap();

        let view = EntryView::from(&entry);
        assert_eq!(view.key, r#"("issue")"#);
        assert_eq!(view.status, "awaiting-approval");
        assert_eq!(view.action, "hello");
        assert!(view.created_ms > 0);
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains(r#""status":"awaiting-approval""#));
    }

    #[test]
    fn open_missing_store_fails() {
        let dir = std::env::temp_dir().join("actlog-cli-missing-store");
        assert!(open_store(&dir).is_err());
    }
}
