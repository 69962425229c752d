//! The action log.

use super::entry::{Decision, Entry};
use crate::error::{CoreError, CoreResult};
use crate::timed::{self, TimedAfter, TimedEntry, TimedScan};
use crate::watcher::Watcher;
use actlog_codec::{from_record, to_record, CodecError, KeyDecoder, KeyEncoder};
use actlog_storage::{DbTime, KvStore, RangeIter};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Timed kind holding action log entries.
pub const ACTION_KIND: &str = "action.Log";

const BY_CREATED: &str = "action.ByCreated";

/// Returns the handle of the entry `(kind, key)`.
///
/// Handles sort by kind and then by key.
#[must_use]
pub fn handle(kind: &str, key: &[u8]) -> Vec<u8> {
    KeyEncoder::new().str(kind).raw(key).into_bytes()
}

fn split_handle(handle: &[u8]) -> CoreResult<(String, &[u8])> {
    let mut decoder = KeyDecoder::new(handle);
    let kind = decoder
        .read_str()
        .map_err(|e| CoreError::decode(format!("action handle: {e}")))?;
    Ok((kind, decoder.remaining()))
}

fn created_key(created: SystemTime, t: DbTime) -> Vec<u8> {
    KeyEncoder::new()
        .str(BY_CREATED)
        .uint(unix_nanos(created))
        .uint(t.as_u64())
        .into_bytes()
}

fn unix_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn decode_entry(raw: TimedEntry) -> CoreResult<Entry> {
    let mut entry: Entry = from_record(&raw.value)?;
    entry.db_time = raw.db_time;
    Ok(entry)
}

/// A durable, time-ordered log of action lifecycles.
///
/// Every mutation is one atomic timed write, so each change to an entry
/// gives it a new DBTime. Mutations from one process are serialized, so
/// concurrent decisions and completions on the same entry are never lost.
///
/// # Example
///
/// ```
/// use actlog_core::{ActionLog, Decision};
/// use actlog_codec::{encode, Value};
/// use actlog_storage::MemoryStore;
/// use std::sync::Arc;
///
/// let log = ActionLog::new(Arc::new(MemoryStore::new()));
/// let key = encode(&[Value::Uint(1)]);
/// let h = log.begin("post", &key, b"hello", true).unwrap();
/// log.add_decision("post", &key, Decision::approve("ann")).unwrap();
/// log.complete(&h, b"ok", None).unwrap();
///
/// let entry = log.get("post", &key).unwrap().unwrap();
/// assert!(entry.done && entry.approved());
/// ```
pub struct ActionLog<S: KvStore + ?Sized> {
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: KvStore + ?Sized> ActionLog<S> {
    /// Creates an action log over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Records the start of the action `(kind, key)` and returns its handle.
    ///
    /// If the entry already exists nothing is written and the existing
    /// entry's handle is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be read or written.
    pub fn begin(
        &self,
        kind: &str,
        key: &[u8],
        action: &[u8],
        approval_required: bool,
    ) -> CoreResult<Vec<u8>> {
        let h = handle(kind, key);
        let _guard = self.write_lock.lock();
        if timed::get(&*self.store, ACTION_KIND, &h)?.is_some() {
            debug!(%kind, "begin on existing action");
            return Ok(h);
        }

        let now = SystemTime::now();
        let entry = Entry {
            created: now,
            kind: kind.to_string(),
            key: key.to_vec(),
            action: action.to_vec(),
            approval_required,
            decisions: Vec::new(),
            done: false,
            result: Vec::new(),
            error: String::new(),
            mod_time: now,
            db_time: DbTime::ZERO,
        };
        let record = to_record(&entry)?;
        let t = timed::commit(&*self.store, |w| {
            let t = w.set(ACTION_KIND, &h, &record, None);
            w.put(created_key(now, t), h.clone());
            t
        })?;
        debug!(%kind, db_time = %t, approval_required, "began action");
        Ok(h)
    }

    /// Marks the action behind `handle` done with `result` and `err`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the action was never begun.
    pub fn complete(
        &self,
        handle: &[u8],
        result: &[u8],
        err: Option<&dyn fmt::Display>,
    ) -> CoreResult<()> {
        let _guard = self.write_lock.lock();
        let mut entry = self.load_existing(handle)?;
        entry.done = true;
        entry.result = result.to_vec();
        entry.error = err.map(|e| e.to_string()).unwrap_or_default();
        entry.mod_time = advance(entry.mod_time);
        let t = self.write(handle, &entry)?;
        debug!(kind = %entry.kind, db_time = %t, failed = !entry.error.is_empty(), "completed action");
        Ok(())
    }

    /// Appends `decision` to the action `(kind, key)`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the action was never begun.
    pub fn add_decision(&self, kind: &str, key: &[u8], decision: Decision) -> CoreResult<()> {
        let h = handle(kind, key);
        let _guard = self.write_lock.lock();
        let mut entry = self.load_existing(&h)?;
        debug!(%kind, name = %decision.name, approved = decision.approved, "adding decision");
        entry.decisions.push(decision);
        entry.mod_time = advance(entry.mod_time);
        self.write(&h, &entry)?;
        Ok(())
    }

    /// Returns the entry `(kind, key)`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be read or decoded.
    pub fn get(&self, kind: &str, key: &[u8]) -> CoreResult<Option<Entry>> {
        self.get_by_handle(&handle(kind, key))
    }

    /// Returns the entry behind `handle`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be read or decoded.
    pub fn get_by_handle(&self, handle: &[u8]) -> CoreResult<Option<Entry>> {
        timed::get(&*self.store, ACTION_KIND, handle)?
            .map(decode_entry)
            .transpose()
    }

    /// Scans entries whose handles fall in `[start, end)`, in handle order.
    pub fn scan(&self, start: &[u8], end: &[u8]) -> Entries<S> {
        Entries {
            inner: timed::scan(Arc::clone(&self.store), ACTION_KIND, start, Some(end)),
        }
    }

    /// Scans every entry in handle order.
    pub fn scan_all(&self) -> Entries<S> {
        Entries {
            inner: timed::scan(Arc::clone(&self.store), ACTION_KIND, &[], None),
        }
    }

    /// Scans the entries of one kind in key order.
    pub fn scan_kind(&self, kind: &str) -> Entries<S> {
        let start = handle(kind, &[]);
        let end = timed::tuple_end(&start);
        self.scan(&start, &end)
    }

    /// Scans entries written after `t`, in DBTime order.
    pub fn scan_after_db_time(&self, t: DbTime) -> EntriesAfter<S> {
        EntriesAfter {
            inner: timed::scan_after(Arc::clone(&self.store), ACTION_KIND, t, None),
        }
    }

    /// Scans entries created at or after `moment`, in DBTime order.
    ///
    /// The creation index turns `moment` into a DBTime lower bound; the
    /// store is not read until the iterator is first advanced.
    pub fn scan_after(&self, moment: SystemTime) -> CreatedAfter<S> {
        CreatedAfter {
            store: Arc::clone(&self.store),
            moment,
            state: CreatedState::Unstarted,
        }
    }

    /// Opens the watcher `name` over the action log.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher's mark cannot be read.
    pub fn watcher(&self, name: &str) -> CoreResult<Watcher<S, Entry>> {
        Watcher::new(Arc::clone(&self.store), name, ACTION_KIND, decode_entry)
    }

    fn load_existing(&self, handle: &[u8]) -> CoreResult<Entry> {
        match self.get_by_handle(handle)? {
            Some(entry) => Ok(entry),
            None => {
                let (kind, key) = split_handle(handle)?;
                Err(CoreError::not_found(kind, key))
            }
        }
    }

    fn write(&self, handle: &[u8], entry: &Entry) -> CoreResult<DbTime> {
        let record = to_record(entry)?;
        timed::commit(&*self.store, |w| {
            w.set(ACTION_KIND, handle, &record, Some(entry.db_time))
        })
    }
}

impl<S: KvStore + ?Sized> fmt::Debug for ActionLog<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionLog").finish_non_exhaustive()
    }
}

fn advance(previous: SystemTime) -> SystemTime {
    SystemTime::now().max(previous)
}

/// Entries in handle order.
pub struct Entries<S: KvStore + ?Sized> {
    inner: TimedScan<S>,
}

impl<S: KvStore + ?Sized> Iterator for Entries<S> {
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.inner.next()?.and_then(decode_entry))
    }
}

/// Entries in DBTime order.
pub struct EntriesAfter<S: KvStore + ?Sized> {
    inner: TimedAfter<S>,
}

impl<S: KvStore + ?Sized> Iterator for EntriesAfter<S> {
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.inner.next()?.and_then(decode_entry))
    }
}

enum CreatedState<S: KvStore + ?Sized> {
    Unstarted,
    Scanning(EntriesAfter<S>),
    Done,
}

/// Iterator returned by [`ActionLog::scan_after`].
pub struct CreatedAfter<S: KvStore + ?Sized> {
    store: Arc<S>,
    moment: SystemTime,
    state: CreatedState<S>,
}

impl<S: KvStore + ?Sized> CreatedAfter<S> {
    /// Finds the creation DBTime of the first entry created at or after `moment`.
    fn first_creation(&self) -> CoreResult<Option<DbTime>> {
        let start = KeyEncoder::new()
            .str(BY_CREATED)
            .uint(unix_nanos(self.moment))
            .into_bytes();
        let end = KeyEncoder::new().str(BY_CREATED).inf().into_bytes();
        let Some(first) = RangeIter::with_page_size(Arc::clone(&self.store), start, end, 1).next()
        else {
            return Ok(None);
        };
        let (key, _) = first?;
        parse_created_key(&key)
            .map(Some)
            .map_err(|e| CoreError::decode(format!("creation index key: {e}")))
    }
}

fn parse_created_key(key: &[u8]) -> Result<DbTime, CodecError> {
    let mut decoder = KeyDecoder::new(key);
    decoder.read_str()?;
    decoder.read_uint()?;
    Ok(DbTime::new(decoder.read_uint()?))
}

impl<S: KvStore + ?Sized> Iterator for CreatedAfter<S> {
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                CreatedState::Unstarted => match self.first_creation() {
                    Ok(Some(t)) => {
                        let lower = DbTime::new(t.as_u64().saturating_sub(1));
                        self.state = CreatedState::Scanning(EntriesAfter {
                            inner: timed::scan_after(
                                Arc::clone(&self.store),
                                ACTION_KIND,
                                lower,
                                None,
                            ),
                        });
                    }
                    Ok(None) => self.state = CreatedState::Done,
                    Err(e) => {
                        self.state = CreatedState::Done;
                        return Some(Err(e));
                    }
                },
                CreatedState::Scanning(entries) => match entries.next() {
                    Some(Ok(entry)) if entry.created < self.moment => continue,
                    Some(item) => return Some(item),
                    None => self.state = CreatedState::Done,
                },
                CreatedState::Done => return None,
            }
        }
    }
}
