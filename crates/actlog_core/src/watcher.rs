//! Durable watermark watchers over timed key spaces.
//!
//! A [`Watcher`] hands out the records of one timed kind in DBTime order
//! and remembers, under a durable name, how far its consumer has got.
//!
//! ```text
//! recent()      -> items in (persisted mark, last_time at call]
//! mark_old(c)   -> in-memory mark = max(mark, c)
//! flush()       -> persist mark, flush store
//! ```
//!
//! Each item carries a [`Cursor`]; a consumer may advance the mark with
//! any cursor it has been handed, whether or not the iterator that
//! produced it is still open. Marks that were never flushed are lost on
//! restart, and the items after the last flushed mark are delivered
//! again.

use crate::error::CoreResult;
use crate::timed::{self, TimedAfter, TimedEntry};
use actlog_storage::{DbTime, KvStore};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Converts a raw timed record into a watcher item.
pub type Decoder<T> = Arc<dyn Fn(TimedEntry) -> CoreResult<T> + Send + Sync>;

/// Position of one item in a watcher's stream.
///
/// Only a watcher's [`Watcher::recent`] iterator creates cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    db_time: DbTime,
}

impl Cursor {
    /// The DBTime of the item this cursor points at.
    #[must_use]
    pub fn db_time(&self) -> DbTime {
        self.db_time
    }
}

/// An item handed out by a watcher, with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Watched<T> {
    /// Position of the item; pass to [`Watcher::mark_old`] once processed.
    pub cursor: Cursor,
    /// The decoded item.
    pub item: T,
}

/// A named, durable consumer position over one timed kind.
pub struct Watcher<S: KvStore + ?Sized, T> {
    store: Arc<S>,
    name: String,
    kind: String,
    decode: Decoder<T>,
    marked: DbTime,
    flushed: DbTime,
}

impl<S: KvStore + ?Sized, T> Watcher<S, T> {
    /// Opens the watcher `name` over `kind`, loading its persisted mark.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted mark cannot be read.
    pub fn new(
        store: Arc<S>,
        name: impl Into<String>,
        kind: impl Into<String>,
        decode: impl Fn(TimedEntry) -> CoreResult<T> + Send + Sync + 'static,
    ) -> CoreResult<Self> {
        let name = name.into();
        let kind = kind.into();
        let mark = timed::latest_mark(&*store, &kind, &name)?;
        debug!(watcher = %name, %kind, %mark, "opened watcher");
        Ok(Self {
            store,
            name,
            kind,
            decode: Arc::new(decode),
            marked: mark,
            flushed: mark,
        })
    }

    /// Returns the watcher's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the watched kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns every item written after the persisted mark, in DBTime order.
    ///
    /// The upper bound is fixed at the store's last time when this is
    /// called; later writes are left for the next call.
    #[must_use]
    pub fn recent(&self) -> Recent<S, T> {
        let upto = self.store.last_time();
        Recent {
            inner: timed::scan_after(Arc::clone(&self.store), &self.kind, self.flushed, Some(upto)),
            decode: Arc::clone(&self.decode),
        }
    }

    /// Records that every item up to and including `cursor` is processed.
    ///
    /// The mark never moves backwards.
    pub fn mark_old(&mut self, cursor: Cursor) {
        if cursor.db_time > self.marked {
            self.marked = cursor.db_time;
        }
    }

    /// Persists the in-memory mark and flushes the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the mark cannot be written or flushed. The
    /// persisted mark is unchanged on error.
    pub fn flush(&mut self) -> CoreResult<()> {
        if self.marked != self.flushed {
            self.store.set(
                &timed::mark_key(&self.kind, &self.name),
                &self.marked.to_be_bytes(),
            )?;
        }
        self.store.flush()?;
        if self.marked != self.flushed {
            debug!(watcher = %self.name, from = %self.flushed, to = %self.marked, "watermark advanced");
            self.flushed = self.marked;
        }
        Ok(())
    }

    /// Returns the persisted mark.
    #[must_use]
    pub fn latest(&self) -> DbTime {
        self.flushed
    }

    /// Returns the in-memory mark, which may be ahead of [`Watcher::latest`].
    #[must_use]
    pub fn marked(&self) -> DbTime {
        self.marked
    }
}

impl<S: KvStore + ?Sized, T> fmt::Debug for Watcher<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("marked", &self.marked)
            .field("flushed", &self.flushed)
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`Watcher::recent`].
///
/// Holds no borrow of the watcher, so the consumer can call
/// [`Watcher::mark_old`] and [`Watcher::flush`] while iterating.
pub struct Recent<S: KvStore + ?Sized, T> {
    inner: TimedAfter<S>,
    decode: Decoder<T>,
}

impl<S: KvStore + ?Sized, T> Iterator for Recent<S, T> {
    type Item = CoreResult<Watched<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        let cursor = Cursor {
            db_time: entry.db_time,
        };
        Some((self.decode)(entry).map(|item| Watched { cursor, item }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actlog_codec::{encode, Value};
    use actlog_storage::MemoryStore;

    fn put(store: &MemoryStore, n: u64, value: &str) {
        let key = encode(&[Value::Uint(n)]);
        let previous = timed::get(store, "num", &key).unwrap().map(|e| e.db_time);
        timed::commit(store, |w| w.set("num", &key, value.as_bytes(), previous)).unwrap();
    }

    fn watcher(store: &Arc<MemoryStore>) -> Watcher<MemoryStore, String> {
        Watcher::new(Arc::clone(store), "w", "num", |e: TimedEntry| {
            Ok(String::from_utf8_lossy(&e.value).into_owned())
        })
        .unwrap()
    }

    fn drain(w: &Watcher<MemoryStore, String>) -> Vec<Watched<String>> {
        w.recent().map(Result::unwrap).collect()
    }

    #[test]
    fn recent_yields_in_write_order() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 2, "b");
        put(&store, 1, "a");
        let w = watcher(&store);
        let items: Vec<String> = drain(&w).into_iter().map(|x| x.item).collect();
        assert_eq!(items, vec!["b", "a"]);
    }

    #[test]
    fn flushed_mark_hides_old_items() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 1, "a");
        put(&store, 2, "b");
        let mut w = watcher(&store);
        let items = drain(&w);
        w.mark_old(items[0].cursor);
        w.flush().unwrap();
        assert_eq!(w.latest(), items[0].cursor.db_time());

        let rest: Vec<String> = drain(&w).into_iter().map(|x| x.item).collect();
        assert_eq!(rest, vec!["b"]);
    }

    #[test]
    fn mark_never_moves_backwards() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 1, "a");
        put(&store, 2, "b");
        let mut w = watcher(&store);
        let items = drain(&w);
        w.mark_old(items[1].cursor);
        w.mark_old(items[0].cursor);
        assert_eq!(w.marked(), items[1].cursor.db_time());
    }

    #[test]
    fn unflushed_mark_is_redelivered() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 1, "a");
        {
            let mut w = watcher(&store);
            let items = drain(&w);
            w.mark_old(items[0].cursor);
            // Dropped without flush.
        }
        let w = watcher(&store);
        assert_eq!(w.latest(), DbTime::ZERO);
        assert_eq!(drain(&w).len(), 1);
    }

    #[test]
    fn mark_persists_across_watchers() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 1, "a");
        let mut w = watcher(&store);
        let items = drain(&w);
        w.mark_old(items[0].cursor);
        w.flush().unwrap();

        let again = watcher(&store);
        assert_eq!(again.latest(), items[0].cursor.db_time());
        assert!(drain(&again).is_empty());
        assert_eq!(
            timed::latest_mark(&*store, "num", "w").unwrap(),
            items[0].cursor.db_time()
        );
    }

    #[test]
    fn recent_snapshot_excludes_later_writes() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 1, "a");
        let w = watcher(&store);
        let mut recent = w.recent();
        put(&store, 2, "b");
        assert_eq!(recent.next().unwrap().unwrap().item, "a");
        assert!(recent.next().is_none());
        assert_eq!(drain(&w).len(), 2);
    }

    #[test]
    fn rewritten_item_is_delivered_again() {
        let store = Arc::new(MemoryStore::new());
        put(&store, 1, "a");
        let mut w = watcher(&store);
        for x in drain(&w) {
            w.mark_old(x.cursor);
        }
        w.flush().unwrap();
        put(&store, 1, "a2");
        let items: Vec<String> = drain(&w).into_iter().map(|x| x.item).collect();
        assert_eq!(items, vec!["a2"]);
    }

    #[test]
    fn mark_while_iterating() {
        let store = Arc::new(MemoryStore::new());
        for n in 1..=3 {
            put(&store, n, "x");
        }
        let mut w = watcher(&store);
        for x in w.recent() {
            let x = x.unwrap();
            w.mark_old(x.cursor);
            w.flush().unwrap();
        }
        assert_eq!(w.latest(), DbTime::new(3));
    }
}
