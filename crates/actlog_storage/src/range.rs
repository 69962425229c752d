//! Lazy paged range iteration.

use crate::error::StorageResult;
use crate::store::KvStore;
use std::sync::Arc;

/// A lazy iterator over the pairs of a store in `[start, end)`.
///
/// The iterator fetches one page at a time through
/// [`KvStore::scan_page`] and holds no lock between pages, so writes
/// may interleave with iteration. Keys already returned are never
/// returned again; keys written behind the cursor are not seen.
///
/// Each call to [`RangeIter::new`] is a fresh cursor. After the first
/// error the iterator is exhausted.
pub struct RangeIter<S: KvStore + ?Sized> {
    store: Arc<S>,
    next: Vec<u8>,
    end: Vec<u8>,
    page: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
    page_size: usize,
    exhausted: bool,
}

impl<S: KvStore + ?Sized> RangeIter<S> {
    /// Creates an iterator over `[start, end)` using the store's page size.
    pub fn new(store: Arc<S>, start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        let page_size = store.page_size();
        Self::with_page_size(store, start, end, page_size)
    }

    /// Creates an iterator with an explicit page size.
    pub fn with_page_size(
        store: Arc<S>,
        start: impl Into<Vec<u8>>,
        end: impl Into<Vec<u8>>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            next: start.into(),
            end: end.into(),
            page: Vec::new().into_iter(),
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> StorageResult<()> {
        let page = self
            .store
            .scan_page(&self.next, &self.end, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        match page.last() {
            Some((last, _)) => {
                // Smallest key strictly greater than `last`.
                self.next.clear();
                self.next.extend_from_slice(last);
                self.next.push(0);
            }
            None => self.exhausted = true,
        }
        self.page = page.into_iter();
        Ok(())
    }
}

impl<S: KvStore + ?Sized> Iterator for RangeIter<S> {
    type Item = StorageResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.page.next() {
                return Some(Ok(pair));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::WriteBatch;

    fn store_with(keys: &[&[u8]]) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for k in keys {
            batch.set(k.to_vec(), k.to_vec());
        }
        store.apply(batch).unwrap();
        Arc::new(store)
    }

    #[test]
    fn iterates_across_pages() {
        let store = store_with(&[b"a", b"b", b"c", b"d", b"e"]);
        let keys: Vec<Vec<u8>> = RangeIter::with_page_size(store, b"a".to_vec(), b"z".to_vec(), 2)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec(), b"e".to_vec()]
        );
    }

    #[test]
    fn respects_half_open_bounds() {
        let store = store_with(&[b"a", b"b", b"c"]);
        let keys: Vec<Vec<u8>> = RangeIter::new(store, b"b".to_vec(), b"c".to_vec())
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"b".to_vec()]);
    }

    #[test]
    fn empty_and_inverted_ranges() {
        let store = store_with(&[b"a", b"b"]);
        assert_eq!(RangeIter::new(Arc::clone(&store), b"x".to_vec(), b"z".to_vec()).count(), 0);
        assert_eq!(RangeIter::new(store, b"b".to_vec(), b"a".to_vec()).count(), 0);
    }

    #[test]
    fn key_with_zero_suffix_is_not_skipped() {
        let store = store_with(&[b"a", b"a\x00", b"a\x00\x00", b"b"]);
        let keys: Vec<Vec<u8>> = RangeIter::with_page_size(store, Vec::new(), b"z".to_vec(), 1)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn writes_behind_cursor_are_not_revisited() {
        let store = store_with(&[b"b", b"c", b"d"]);
        let mut iter =
            RangeIter::with_page_size(Arc::clone(&store), Vec::new(), b"z".to_vec(), 1);
        assert_eq!(iter.next().unwrap().unwrap().0, b"b".to_vec());
        store.set(b"a", b"late").unwrap();
        let rest: Vec<Vec<u8>> = iter.map(|r| r.unwrap().0).collect();
        assert_eq!(rest, vec![b"c".to_vec(), b"d".to_vec()]);
    }
}
