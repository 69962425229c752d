//! The vector destination.

use crate::error::{SyncError, SyncResult};
use actlog_codec::KeyEncoder;
use actlog_core::CoreError;
use actlog_storage::{KvStore, WriteBatch};
use std::sync::Arc;

const VECTOR_KIND: &str = "vector.Vec";

/// A store of vectors keyed by document id.
pub trait VectorDb: Send + Sync {
    /// Starts a batch of writes.
    fn batch(&self) -> Box<dyn VectorBatch + '_>;

    /// Returns the vector stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector cannot be read.
    fn get(&self, id: &str) -> SyncResult<Option<Vec<f32>>>;

    /// Makes applied batches durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self) -> SyncResult<()>;
}

/// Pending vector writes.
pub trait VectorBatch {
    /// Queues `vector` for `id`, replacing any previous vector.
    fn set(&mut self, id: &str, vector: &[f32]);

    /// Number of queued writes.
    fn len(&self) -> usize;

    /// Returns true if nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every queued write atomically and clears the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the writes cannot be applied.
    fn apply(&mut self) -> SyncResult<()>;
}

fn vector_key(id: &str) -> Vec<u8> {
    KeyEncoder::new().str(VECTOR_KIND).str(id).into_bytes()
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> SyncResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(CoreError::decode(format!("vector of {} bytes", bytes.len())).into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// A [`VectorDb`] that keeps vectors in an ordered store.
///
/// Vectors live under `("vector.Vec", id)` as little-endian `f32`s.
#[derive(Debug)]
pub struct StoreVectorDb<S: KvStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KvStore + ?Sized> StoreVectorDb<S> {
    /// Creates a vector store over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: KvStore + ?Sized> VectorDb for StoreVectorDb<S> {
    fn batch(&self) -> Box<dyn VectorBatch + '_> {
        Box::new(StoreVectorBatch {
            store: &*self.store,
            batch: WriteBatch::new(),
        })
    }

    fn get(&self, id: &str) -> SyncResult<Option<Vec<f32>>> {
        match self.store.get(&vector_key(id))? {
            Some(bytes) => decode_vector(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn flush(&self) -> SyncResult<()> {
        self.store.flush().map_err(SyncError::from)
    }
}

struct StoreVectorBatch<'a, S: KvStore + ?Sized> {
    store: &'a S,
    batch: WriteBatch,
}

impl<S: KvStore + ?Sized> VectorBatch for StoreVectorBatch<'_, S> {
    fn set(&mut self, id: &str, vector: &[f32]) {
        self.batch.set(vector_key(id), encode_vector(vector));
    }

    fn len(&self) -> usize {
        self.batch.len()
    }

    fn apply(&mut self) -> SyncResult<()> {
        let batch = std::mem::take(&mut self.batch);
        self.store.apply(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actlog_storage::MemoryStore;

    #[test]
    fn batch_apply_and_get() {
        let db = StoreVectorDb::new(Arc::new(MemoryStore::new()));
        let mut batch = db.batch();
        batch.set("a", &[1.0, -2.5]);
        batch.set("b", &[]);
        assert_eq!(batch.len(), 2);
        assert!(db.get("a").unwrap().is_none());
        batch.apply().unwrap();
        assert!(batch.is_empty());
        drop(batch);

        assert_eq!(db.get("a").unwrap(), Some(vec![1.0, -2.5]));
        assert_eq!(db.get("b").unwrap(), Some(vec![]));
        assert!(db.get("c").unwrap().is_none());
        db.flush().unwrap();
    }

    #[test]
    fn malformed_vector_is_decode_error() {
        let store = Arc::new(MemoryStore::new());
        store.set(&vector_key("a"), &[1, 2, 3]).unwrap();
        let db = StoreVectorDb::new(store);
        assert!(matches!(
            db.get("a"),
            Err(SyncError::Core(CoreError::Decode { .. }))
        ));
    }
}
