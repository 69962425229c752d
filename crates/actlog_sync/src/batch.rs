//! Batching a watcher's stream.

use crate::error::SyncResult;
use actlog_core::{Cursor, Watched, Watcher};
use actlog_storage::KvStore;
use std::mem;
use tracing::debug;

/// Accumulates watched items into fixed-size batches.
///
/// Each batch remembers the cursor of its last item, which is the position
/// to mark once the batch has been handled.
#[derive(Debug)]
pub struct Batcher<T> {
    size: usize,
    items: Vec<T>,
    last: Option<Cursor>,
}

impl<T> Batcher<T> {
    /// Creates a batcher that fills at `size` items. Zero is treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            items: Vec::with_capacity(size),
            last: None,
        }
    }

    /// Adds an item. Returns true once the batch is full.
    pub fn push(&mut self, watched: Watched<T>) -> bool {
        self.last = Some(watched.cursor);
        self.items.push(watched.item);
        self.items.len() >= self.size
    }

    /// Removes the pending items together with the cursor of the last one.
    pub fn take(&mut self) -> Option<(Vec<T>, Cursor)> {
        let cursor = self.last.take()?;
        Some((mem::take(&mut self.items), cursor))
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Counts from one [`drive`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStats {
    /// Items handled by successful flushes.
    pub items: usize,
    /// Successful flushes.
    pub batches: usize,
}

/// Feeds every recent item of `watcher` to `flush` in batches of `batch_size`.
///
/// After each successful flush the watcher is marked at the batch's last
/// item and persisted. A partial batch left when the stream ends is flushed
/// the same way. On the first error the watcher stays at the last
/// successful batch and the error is returned.
///
/// # Errors
///
/// Returns the first error from the watcher, from `flush`, or from
/// persisting the mark.
pub fn drive<S, T, F>(
    watcher: &mut Watcher<S, T>,
    batch_size: usize,
    flush: F,
) -> SyncResult<DriveStats>
where
    S: KvStore + ?Sized,
    F: FnMut(Vec<T>) -> SyncResult<()>,
{
    let mut stats = DriveStats::default();
    drive_counted(watcher, batch_size, &mut stats, flush)?;
    Ok(stats)
}

/// Like [`drive`], but adds to `stats` as batches complete, so the counts
/// of batches finished before an error are kept.
///
/// # Errors
///
/// See [`drive`].
pub fn drive_counted<S, T, F>(
    watcher: &mut Watcher<S, T>,
    batch_size: usize,
    stats: &mut DriveStats,
    mut flush: F,
) -> SyncResult<()>
where
    S: KvStore + ?Sized,
    F: FnMut(Vec<T>) -> SyncResult<()>,
{
    let mut batcher = Batcher::new(batch_size);
    for watched in watcher.recent() {
        if batcher.push(watched?) {
            flush_pending(watcher, &mut batcher, &mut flush, stats)?;
        }
    }
    flush_pending(watcher, &mut batcher, &mut flush, stats)
}

fn flush_pending<S, T, F>(
    watcher: &mut Watcher<S, T>,
    batcher: &mut Batcher<T>,
    flush: &mut F,
    stats: &mut DriveStats,
) -> SyncResult<()>
where
    S: KvStore + ?Sized,
    F: FnMut(Vec<T>) -> SyncResult<()>,
{
    let Some((items, cursor)) = batcher.take() else {
        return Ok(());
    };
    let count = items.len();
    flush(items)?;
    watcher.mark_old(cursor);
    watcher.flush()?;
    stats.items += count;
    stats.batches += 1;
    debug!(watcher = watcher.name(), count, mark = %cursor.db_time(), "batch flushed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use actlog_core::{Corpus, Doc};
    use actlog_storage::MemoryStore;
    use std::sync::Arc;

    fn corpus(n: usize) -> Corpus<MemoryStore> {
        let corpus = Corpus::new(Arc::new(MemoryStore::new()));
        for i in 0..n {
            corpus.add(&format!("doc{i:02}"), "", "text").unwrap();
        }
        corpus
    }

    #[test]
    fn batcher_fills_and_takes() {
        let corpus = corpus(3);
        let watcher = corpus.watcher("b").unwrap();
        let mut batcher = Batcher::new(2);
        assert!(batcher.take().is_none());

        let mut items = watcher.recent();
        assert!(!batcher.push(items.next().unwrap().unwrap()));
        let second = items.next().unwrap().unwrap();
        let cursor = second.cursor;
        assert!(batcher.push(second));
        assert_eq!(batcher.len(), 2);

        let (docs, last) = batcher.take().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(last, cursor);
        assert!(batcher.is_empty());
        assert!(batcher.take().is_none());
    }

    #[test]
    fn drive_flushes_trailing_batch() {
        let corpus = corpus(5);
        let mut watcher = corpus.watcher("b").unwrap();
        let mut sizes = Vec::new();
        let stats = drive(&mut watcher, 2, |docs: Vec<Doc>| {
            sizes.push(docs.len());
            Ok(())
        })
        .unwrap();

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(stats, DriveStats { items: 5, batches: 3 });
        assert_eq!(watcher.latest(), corpus.store().last_time());
        assert_eq!(watcher.recent().count(), 0);
    }

    #[test]
    fn drive_stops_at_failed_batch() {
        let corpus = corpus(5);
        let mut watcher = corpus.watcher("b").unwrap();
        let mut calls = 0;
        let err = drive(&mut watcher, 2, |_docs: Vec<Doc>| {
            calls += 1;
            if calls == 2 {
                Err(SyncError::transform("boom", 0))
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert!(matches!(err, SyncError::Transform { .. }));
        assert_eq!(calls, 2);
        let remaining: Vec<String> = watcher.recent().map(|d| d.unwrap().item.id).collect();
        assert_eq!(remaining, vec!["doc02", "doc03", "doc04"]);
    }

    #[test]
    fn counted_drive_keeps_completed_batches_on_error() {
        let corpus = corpus(5);
        let mut watcher = corpus.watcher("b").unwrap();
        let mut stats = DriveStats::default();
        let mut calls = 0;
        let result = drive_counted(&mut watcher, 2, &mut stats, |_docs: Vec<Doc>| {
            calls += 1;
            if calls == 3 {
                Err(SyncError::Cancelled)
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert_eq!(stats, DriveStats { items: 4, batches: 2 });
    }

    #[test]
    fn drive_on_empty_stream() {
        let corpus = corpus(0);
        let mut watcher = corpus.watcher("b").unwrap();
        let stats = drive(&mut watcher, 10, |_docs: Vec<Doc>| Ok(())).unwrap();
        assert_eq!(stats, DriveStats::default());
    }
}
