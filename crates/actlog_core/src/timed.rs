//! Timed key spaces.
//!
//! A timed write stores a value together with the [`DbTime`] the store
//! assigned to it, and records the write in a per-kind time index so the
//! kind can be read back in write order.
//!
//! ```text
//! ("timed", kind) ++ key                -> dbtime (8 bytes BE) ++ value
//! ("timed.ByTime", kind, dbtime) ++ key -> ""
//! ("timed.Watcher", kind, name)         -> mark (8 bytes BE)
//! ```
//!
//! Rewriting a key leaves its old index entry behind unless the caller
//! passes the previous DBTime. Scans by time skip index entries whose
//! primary record has since moved to a newer time.

use crate::error::{CoreError, CoreResult};
use actlog_codec::{prefix_end, CodecError, KeyDecoder, KeyEncoder};
use actlog_storage::{DbTime, KvStore, RangeIter, Timestamps, WriteBatch};
use std::sync::Arc;
use tracing::{debug, warn};

const PRIMARY: &str = "timed";
const BY_TIME: &str = "timed.ByTime";
const WATCHER: &str = "timed.Watcher";

/// A record read back from a timed key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEntry {
    /// The key within its kind.
    pub key: Vec<u8>,
    /// The stored value.
    pub value: Vec<u8>,
    /// Time of the most recent write to the key.
    pub db_time: DbTime,
}

fn primary_prefix(kind: &str) -> Vec<u8> {
    KeyEncoder::new().str(PRIMARY).str(kind).into_bytes()
}

fn primary_key(kind: &str, key: &[u8]) -> Vec<u8> {
    KeyEncoder::from_key(&primary_prefix(kind)).raw(key).into_bytes()
}

fn index_key(kind: &str, t: DbTime, key: &[u8]) -> Vec<u8> {
    KeyEncoder::new()
        .str(BY_TIME)
        .str(kind)
        .uint(t.as_u64())
        .raw(key)
        .into_bytes()
}

pub(crate) fn mark_key(kind: &str, name: &str) -> Vec<u8> {
    KeyEncoder::new().str(WATCHER).str(kind).str(name).into_bytes()
}

/// Upper bound for every key that starts with an encoded tuple prefix.
pub(crate) fn tuple_end(prefix: &[u8]) -> Vec<u8> {
    prefix_end(prefix).unwrap_or_else(|| KeyEncoder::from_key(prefix).inf().into_bytes())
}

fn split_record(key: Vec<u8>, mut record: Vec<u8>) -> CoreResult<TimedEntry> {
    if record.len() < 8 {
        return Err(CoreError::decode(format!(
            "timed record of {} bytes is shorter than its time",
            record.len()
        )));
    }
    let value = record.split_off(8);
    let mut t = [0u8; 8];
    t.copy_from_slice(&record);
    Ok(TimedEntry {
        key,
        value,
        db_time: DbTime::from_be_bytes(t),
    })
}

/// Reads the current record for `key`.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the record is malformed.
pub fn get<S: KvStore + ?Sized>(store: &S, kind: &str, key: &[u8]) -> CoreResult<Option<TimedEntry>> {
    match store.get(&primary_key(kind, key))? {
        Some(record) => split_record(key.to_vec(), record).map(Some),
        None => Ok(None),
    }
}

/// Reads the persisted mark of the watcher `name` over `kind`.
///
/// A watcher that never flushed has mark [`DbTime::ZERO`].
///
/// # Errors
///
/// Returns an error if the store cannot be read or the mark is malformed.
pub fn latest_mark<S: KvStore + ?Sized>(store: &S, kind: &str, name: &str) -> CoreResult<DbTime> {
    match store.get(&mark_key(kind, name))? {
        None => Ok(DbTime::ZERO),
        Some(bytes) => {
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                CoreError::decode(format!("watcher mark of {} bytes", bytes.len()))
            })?;
            Ok(DbTime::from_be_bytes(raw))
        }
    }
}

/// Builds the writes of one timed commit.
///
/// Obtained through [`commit`]; every [`TimedWriter::set`] receives a
/// fresh DBTime and all writes land in one atomic batch.
pub struct TimedWriter<'a> {
    stamps: &'a mut Timestamps,
    batch: WriteBatch,
}

impl TimedWriter<'_> {
    /// Writes `value` at `key` in `kind` and returns the DBTime assigned.
    ///
    /// `previous` is the key's DBTime before this write, if it had one;
    /// its index entry is removed.
    pub fn set(&mut self, kind: &str, key: &[u8], value: &[u8], previous: Option<DbTime>) -> DbTime {
        let t = self.stamps.next();
        if let Some(prev) = previous {
            self.batch.delete(index_key(kind, prev, key));
        }
        let mut record = Vec::with_capacity(8 + value.len());
        record.extend_from_slice(&t.to_be_bytes());
        record.extend_from_slice(value);
        self.batch.set(primary_key(kind, key), record);
        self.batch.set(index_key(kind, t, key), Vec::new());
        t
    }

    /// Adds an untimed write to the same batch.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.batch.set(key, value);
    }
}

/// Runs `build` inside one timed store commit and returns its result.
///
/// The store's write lock is held while `build` runs, so `build` must
/// not touch the store.
///
/// # Errors
///
/// Returns an error if the batch cannot be applied.
pub fn commit<S, R, F>(store: &S, build: F) -> CoreResult<R>
where
    S: KvStore + ?Sized,
    F: FnOnce(&mut TimedWriter<'_>) -> R,
{
    let mut build = Some(build);
    let mut out = None;
    store.apply_timed(&mut |stamps| {
        let mut writer = TimedWriter {
            stamps,
            batch: WriteBatch::new(),
        };
        if let Some(build) = build.take() {
            out = Some(build(&mut writer));
        }
        writer.batch
    })?;
    out.ok_or_else(|| CoreError::invalid_operation("store did not run the batch builder"))
}

/// Scans `kind` in key order over `[start, end)`.
///
/// `end = None` scans to the end of the kind.
pub fn scan<S: KvStore + ?Sized>(
    store: Arc<S>,
    kind: &str,
    start: &[u8],
    end: Option<&[u8]>,
) -> TimedScan<S> {
    let prefix = primary_prefix(kind);
    let lo = primary_key(kind, start);
    let hi = match end {
        Some(end) => primary_key(kind, end),
        None => tuple_end(&prefix),
    };
    TimedScan {
        prefix_len: prefix.len(),
        inner: RangeIter::new(store, lo, hi),
    }
}

/// Iterator returned by [`scan`].
pub struct TimedScan<S: KvStore + ?Sized> {
    prefix_len: usize,
    inner: RangeIter<S>,
}

impl<S: KvStore + ?Sized> Iterator for TimedScan<S> {
    type Item = CoreResult<TimedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map_err(CoreError::from).and_then(|(mut key, record)| {
            let key = key.split_off(self.prefix_len);
            split_record(key, record)
        }))
    }
}

/// Scans `kind` in DBTime order over `(after, upto]`.
///
/// `upto = None` scans to the latest write. Each key appears at most
/// once, at its current DBTime. A key rewritten after `upto` is skipped.
pub fn scan_after<S: KvStore + ?Sized>(
    store: Arc<S>,
    kind: &str,
    after: DbTime,
    upto: Option<DbTime>,
) -> TimedAfter<S> {
    let base = KeyEncoder::new().str(BY_TIME).str(kind);
    let lo = match after.as_u64().checked_add(1) {
        Some(t) => base.clone().uint(t).into_bytes(),
        None => base.clone().inf().into_bytes(),
    };
    let hi = match upto.and_then(|t| t.as_u64().checked_add(1)) {
        Some(t) => base.uint(t).into_bytes(),
        None => base.inf().into_bytes(),
    };
    TimedAfter {
        store: Arc::clone(&store),
        kind: kind.to_string(),
        inner: RangeIter::new(store, lo, hi),
    }
}

/// Iterator returned by [`scan_after`].
pub struct TimedAfter<S: KvStore + ?Sized> {
    store: Arc<S>,
    kind: String,
    inner: RangeIter<S>,
}

impl<S: KvStore + ?Sized> TimedAfter<S> {
    fn resolve(&self, index_key: &[u8]) -> CoreResult<Option<TimedEntry>> {
        let (t, key) = parse_index_key(index_key)
            .map_err(|e| CoreError::decode(format!("time index key: {e}")))?;

        match get(&*self.store, &self.kind, key)? {
            Some(entry) if entry.db_time == t => Ok(Some(entry)),
            Some(entry) => {
                debug!(kind = %self.kind, indexed = %t, current = %entry.db_time, "skipping superseded index entry");
                Ok(None)
            }
            None => {
                warn!(kind = %self.kind, indexed = %t, "time index entry without record");
                Ok(None)
            }
        }
    }
}

fn parse_index_key(key: &[u8]) -> Result<(DbTime, &[u8]), CodecError> {
    let mut decoder = KeyDecoder::new(key);
    decoder.read_str()?;
    decoder.read_str()?;
    let t = decoder.read_uint()?;
    Ok((DbTime::new(t), decoder.remaining()))
}

impl<S: KvStore + ?Sized> Iterator for TimedAfter<S> {
    type Item = CoreResult<TimedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, _) = match self.inner.next()? {
                Ok(pair) => pair,
                Err(e) => return Some(Err(e.into())),
            };
            match self.resolve(&key) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
