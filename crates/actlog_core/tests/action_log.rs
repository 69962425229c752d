//! Integration tests for the action log and its watchers.

use actlog_codec::{encode, Value};
use actlog_core::{ActionLog, CoreError, Decision, Entry};
use actlog_storage::{DbTime, FileStore, KvStore, MemoryStore, StoreConfig};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn memory_log() -> ActionLog<MemoryStore> {
    ActionLog::new(Arc::new(MemoryStore::new()))
}

fn num_key() -> Vec<u8> {
    encode(&[Value::from("num"), Value::Int(23)])
}

/// Writes three entries with kinds test-1, test-0, test-1 and distinct creation times.
fn three_entries(log: &ActionLog<MemoryStore>) -> Vec<Entry> {
    let mut out = Vec::new();
    for i in 1..=3i64 {
        thread::sleep(Duration::from_millis(5));
        let kind = format!("test-{}", i % 2);
        let key = encode(&[Value::Int(i)]);
        log.begin(&kind, &key, &[i as u8], false).unwrap();
        out.push(log.get(&kind, &key).unwrap().unwrap());
    }
    out
}

fn ids(entries: &[Entry]) -> Vec<(String, Vec<u8>)> {
    entries
        .iter()
        .map(|e| (e.kind.clone(), e.key.clone()))
        .collect()
}

fn collect<I: Iterator<Item = Result<Entry, CoreError>>>(iter: I) -> Vec<Entry> {
    iter.map(Result::unwrap).collect()
}

struct Bad;

impl fmt::Display for Bad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bad")
    }
}

#[test]
fn begin_then_complete() {
    let log = memory_log();
    let key = num_key();
    let h = log.begin("test", &key, b"action", false).unwrap();

    let e = log.get("test", &key).unwrap().unwrap();
    assert_eq!(e.kind, "test");
    assert_eq!(e.key, key);
    assert_eq!(e.action, b"action".to_vec());
    assert!(!e.done);
    assert!(e.result.is_empty());
    assert!(e.error.is_empty());
    assert!(e.decisions.is_empty());
    assert_eq!(e.created, e.mod_time);

    log.complete(&h, b"result", Some(&Bad as &dyn fmt::Display))
        .unwrap();
    let done = log.get_by_handle(&h).unwrap().unwrap();
    assert!(done.done);
    assert_eq!(done.result, b"result".to_vec());
    assert_eq!(done.error, "bad");
    assert_eq!(done.created, e.created);
    assert!(done.mod_time >= e.mod_time);
    assert!(done.db_time > e.db_time);
}

#[test]
fn begin_is_idempotent() {
    let log = memory_log();
    let key = num_key();
    let h1 = log.begin("test", &key, b"first", false).unwrap();
    let before = log.get("test", &key).unwrap().unwrap();
    let h2 = log.begin("test", &key, b"second", true).unwrap();
    assert_eq!(h1, h2);
    assert_eq!(log.get("test", &key).unwrap().unwrap(), before);
}

#[test]
fn decisions_accumulate_in_order() {
    let log = memory_log();
    let key = num_key();
    log.begin("test", &key, b"action", true).unwrap();
    let d1 = Decision::new("name1", SystemTime::now(), true);
    let d2 = Decision::new("name2", SystemTime::now(), false);
    log.add_decision("test", &key, d1.clone()).unwrap();
    log.add_decision("test", &key, d2.clone()).unwrap();

    let e = log.get("test", &key).unwrap().unwrap();
    assert_eq!(e.decisions, vec![d1, d2]);
    assert!(e.approval_required);
    assert!(!e.approved());
}

#[test]
fn missing_entry_is_not_found() {
    let log = memory_log();
    let key = num_key();
    let err = log
        .add_decision("test", &key, Decision::approve("ann"))
        .unwrap_err();
    assert!(err.is_not_found());

    let h = actlog_core::action::handle("test", &key);
    let err = log.complete(&h, b"", None).unwrap_err();
    assert!(err.is_not_found());
    assert!(log.get("test", &key).unwrap().is_none());
}

#[test]
fn concurrent_decisions_are_not_lost() {
    let log = Arc::new(memory_log());
    let key = num_key();
    log.begin("test", &key, b"action", true).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let log = Arc::clone(&log);
            let key = key.clone();
            thread::spawn(move || {
                log.add_decision("test", &key, Decision::approve(format!("p{i}")))
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(log.get("test", &key).unwrap().unwrap().decisions.len(), 8);
}

#[test]
fn scan_orders_by_kind_then_key() {
    let log = memory_log();
    let written = three_entries(&log);

    let mut by_key = ids(&written);
    by_key.sort();
    let got = collect(log.scan(&[], &encode(&[Value::Inf])));
    assert_eq!(ids(&got), by_key);
    assert_eq!(ids(&collect(log.scan_all())), by_key);

    let test1 = collect(log.scan_kind("test-1"));
    assert_eq!(test1.len(), 2);
    assert!(test1.iter().all(|e| e.kind == "test-1"));
}

#[test]
fn scan_after_db_time_is_write_order() {
    let log = memory_log();
    let written = three_entries(&log);
    assert_eq!(ids(&collect(log.scan_after_db_time(DbTime::ZERO))), ids(&written));

    let after_first = collect(log.scan_after_db_time(written[0].db_time));
    assert_eq!(ids(&after_first), ids(&written[1..]));
}

#[test]
fn scan_after_db_time_moves_updated_entries() {
    let log = memory_log();
    let written = three_entries(&log);
    let h = actlog_core::action::handle(&written[0].kind, &written[0].key);
    log.complete(&h, b"ok", None).unwrap();

    let order = ids(&collect(log.scan_after_db_time(DbTime::ZERO)));
    assert_eq!(
        order,
        ids(&[written[1].clone(), written[2].clone(), written[0].clone()])
    );
}

#[test]
fn scan_after_moment() {
    let log = memory_log();
    let start = SystemTime::now();
    let written = three_entries(&log);
    thread::sleep(Duration::from_millis(5));
    let end = SystemTime::now();

    assert_eq!(ids(&collect(log.scan_after(start))), ids(&written));
    assert!(collect(log.scan_after(end)).is_empty());
    assert_eq!(ids(&collect(log.scan_after(written[0].created))), ids(&written));
    assert_eq!(
        ids(&collect(log.scan_after(written[1].created))),
        ids(&written[1..])
    );
}

#[test]
fn scan_after_excludes_older_entries_even_if_modified() {
    let log = memory_log();
    let written = three_entries(&log);
    let h = actlog_core::action::handle(&written[0].kind, &written[0].key);
    log.complete(&h, b"ok", None).unwrap();

    let got = collect(log.scan_after(written[1].created));
    assert_eq!(ids(&got), ids(&written[1..]));
}

#[test]
fn watcher_redelivers_after_crash_before_flush() {
    let dir = tempdir().unwrap();
    let open = || Arc::new(FileStore::open(dir.path(), StoreConfig::default()).unwrap());

    {
        let log = ActionLog::new(open());
        for n in 1..=3u64 {
            log.begin("post", &encode(&[Value::Uint(n)]), b"x", false).unwrap();
        }
        let mut w = log.watcher("poster").unwrap();
        let items: Vec<_> = w.recent().map(Result::unwrap).collect();
        assert_eq!(items.len(), 3);
        w.mark_old(items[0].cursor);
        w.flush().unwrap();
        // Crash: items 2 and 3 are marked but never flushed.
        w.mark_old(items[2].cursor);
    }

    let log = ActionLog::new(open());
    let w = log.watcher("poster").unwrap();
    assert_eq!(w.latest(), DbTime::new(1));
    let keys: Vec<Vec<u8>> = w.recent().map(|x| x.unwrap().item.key).collect();
    assert_eq!(
        keys,
        vec![encode(&[Value::Uint(2)]), encode(&[Value::Uint(3)])]
    );
}

#[test]
fn entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let key = num_key();
    {
        let store = Arc::new(FileStore::open(dir.path(), StoreConfig::default()).unwrap());
        let log = ActionLog::new(store);
        let h = log.begin("test", &key, b"action", true).unwrap();
        log.add_decision("test", &key, Decision::approve("ann")).unwrap();
        log.complete(&h, b"done", None).unwrap();
    }
    let store = Arc::new(FileStore::open(dir.path(), StoreConfig::default()).unwrap());
    let log = ActionLog::new(store);
    let e = log.get("test", &key).unwrap().unwrap();
    assert!(e.done && e.approved());
    assert_eq!(e.result, b"done".to_vec());
    assert_eq!(collect(log.scan_after_db_time(DbTime::ZERO)).len(), 1);
}

#[test]
fn malformed_time_index_key_is_decode_error() {
    let log = memory_log();
    log.begin("test", &num_key(), b"action", false).unwrap();
    // Sorts after every valid DBTime entry of the kind.
    let bad = encode(&[
        Value::from("timed.ByTime"),
        Value::from("action.Log"),
        Value::Bool(true),
    ]);
    log.store().set(&bad, b"").unwrap();

    let results: Vec<Result<Entry, CoreError>> = log.scan_after_db_time(DbTime::ZERO).collect();
    assert!(results.len() >= 2);
    assert_eq!(results[0].as_ref().unwrap().key, num_key());
    assert!(matches!(results[1], Err(CoreError::Decode { .. })));
}

#[test]
fn malformed_creation_index_key_is_decode_error() {
    let log = memory_log();
    let bad = encode(&[Value::from("action.ByCreated"), Value::Bool(true)]);
    log.store().set(&bad, b"").unwrap();

    let first = log.scan_after(SystemTime::UNIX_EPOCH).next();
    assert!(matches!(first, Some(Err(CoreError::Decode { .. }))));
}
