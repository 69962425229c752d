//! Ordered key-value store trait definition.

use crate::batch::WriteBatch;
use crate::error::StorageResult;
use std::fmt;

/// Page size used by range scans when a store does not override it.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Logical write time assigned by a store.
///
/// DBTimes are strictly increasing across every timed write to a store,
/// regardless of which key space the write belongs to. Zero precedes
/// every write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DbTime(pub u64);

impl DbTime {
    /// The time before any write.
    pub const ZERO: DbTime = DbTime(0);

    /// Creates a DBTime from its raw value.
    #[must_use]
    pub const fn new(t: u64) -> Self {
        Self(t)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Encodes the time as 8 big-endian bytes.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decodes a time from 8 big-endian bytes.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for DbTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dbtime:{}", self.0)
    }
}

/// Issues strictly increasing [`DbTime`]s for one timed commit.
///
/// A store hands a `Timestamps` to the batch builder passed to
/// [`KvStore::apply_timed`]; every call to [`Timestamps::next`] returns a
/// time greater than any time previously applied to that store.
#[derive(Debug)]
pub struct Timestamps {
    last: u64,
}

impl Timestamps {
    /// Creates an allocator whose first issued time is `clock + 1`.
    #[must_use]
    pub const fn starting_after(clock: DbTime) -> Self {
        Self { last: clock.0 }
    }

    /// Issues the next time.
    pub fn next(&mut self) -> DbTime {
        self.last += 1;
        DbTime(self.last)
    }

    /// The most recently issued time, or the starting clock if none was issued.
    #[must_use]
    pub const fn last(&self) -> DbTime {
        DbTime(self.last)
    }
}

/// An ordered byte-keyed store.
///
/// Stores keep keys in ascending lexicographic order and apply every
/// [`WriteBatch`] atomically. They do not interpret keys or values.
///
/// # Invariants
///
/// - `scan_page` returns pairs in ascending key order within `[start, end)`
/// - `apply` and `apply_timed` are all-or-nothing
/// - Times issued inside `apply_timed` are strictly greater than
///   [`KvStore::last_time`] and timed batches are applied in issue order
/// - `flush` makes every applied batch durable
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KvStore: Send + Sync {
    /// Returns the value stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Returns up to `limit` pairs with keys in `[start, end)`, ascending.
    ///
    /// An empty page is returned when `start >= end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn scan_page(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Applies `batch` atomically without advancing the clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be made durable.
    fn apply(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Builds and applies a batch whose writes carry fresh DBTimes.
    ///
    /// The store holds its write lock while `build` runs, so `build`
    /// must not call back into the store. Returns the last time issued
    /// (or the unchanged clock if `build` issued none).
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be made durable. The clock
    /// does not advance on failure.
    fn apply_timed(
        &self,
        build: &mut dyn FnMut(&mut Timestamps) -> WriteBatch,
    ) -> StorageResult<DbTime>;

    /// Returns the highest DBTime applied so far.
    fn last_time(&self) -> DbTime;

    /// Number of pairs a lazy range scan fetches per page.
    fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

    /// Makes all applied batches durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Writes a single key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.set(key, value);
        self.apply(batch)
    }

    /// Removes a single key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.apply(batch)
    }
}
