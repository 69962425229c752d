//! In-memory store for testing.

use crate::batch::{BatchOp, WriteBatch};
use crate::error::StorageResult;
use crate::store::{DbTime, KvStore, Timestamps, DEFAULT_PAGE_SIZE};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Default)]
struct Inner {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    clock: DbTime,
}

/// An in-memory ordered store.
///
/// This store keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral logs that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use actlog_storage::{KvStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set(b"key", b"value").unwrap();
/// assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose range scans fetch `page_size` pairs at a time.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            page_size: page_size.max(1),
        }
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    /// Returns a copy of every pair in key order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn dump(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.inner
            .read()
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

pub(crate) fn apply_ops(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: Vec<BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Set { key, value } => {
                map.insert(key, value);
            }
            BatchOp::Delete { key } => {
                map.remove(&key);
            }
        }
    }
}

pub(crate) fn page(
    map: &BTreeMap<Vec<u8>, Vec<u8>>,
    start: &[u8],
    end: &[u8],
    limit: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    // BTreeMap::range panics on inverted bounds.
    if start >= end {
        return Vec::new();
    }
    map.range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
        .take(limit)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.inner.read().map.get(key).cloned())
    }

    fn scan_page(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(page(&self.inner.read().map, start, end, limit))
    }

    fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        apply_ops(&mut self.inner.write().map, batch.into_ops());
        Ok(())
    }

    fn apply_timed(
        &self,
        build: &mut dyn FnMut(&mut Timestamps) -> WriteBatch,
    ) -> StorageResult<DbTime> {
        let mut inner = self.inner.write();
        let mut stamps = Timestamps::starting_after(inner.clock);
        let batch = build(&mut stamps);
        apply_ops(&mut inner.map, batch.into_ops());
        inner.clock = stamps.last();
        Ok(inner.clock)
    }

    fn last_time(&self) -> DbTime {
        self.inner.read().clock
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn flush(&self) -> StorageResult<()> {
        // Nothing is buffered
        Ok(())
    }
}
