//! A watched corpus of documents.

use crate::error::CoreResult;
use crate::timed::{self, TimedEntry, TimedScan};
use crate::watcher::Watcher;
use actlog_codec::{from_record, to_record, KeyEncoder};
use actlog_storage::{DbTime, KvStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Timed kind holding documents.
pub const DOC_KIND: &str = "docs.Doc";

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doc {
    /// Unique document identifier.
    pub id: String,
    /// Document title.
    pub title: String,
    /// Document body.
    pub text: String,
    /// Store time of the last change. Not part of the stored record.
    #[serde(skip)]
    pub db_time: DbTime,
}

fn doc_key(id: &str) -> Vec<u8> {
    KeyEncoder::new().str(id).into_bytes()
}

fn decode_doc(raw: TimedEntry) -> CoreResult<Doc> {
    let mut doc: Doc = from_record(&raw.value)?;
    doc.db_time = raw.db_time;
    Ok(doc)
}

/// Documents keyed by id, readable in change order through a [`Watcher`].
pub struct Corpus<S: KvStore + ?Sized> {
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: KvStore + ?Sized> Corpus<S> {
    /// Creates a corpus over `store`.
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

    /// Stores a document and returns its DBTime.
    ///
    /// If the stored document already has the same title and text nothing
    /// is written and its existing DBTime is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or written.
    pub fn add(&self, id: &str, title: &str, text: &str) -> CoreResult<DbTime> {
        let key = doc_key(id);
        let _guard = self.write_lock.lock();
        let previous = match timed::get(&*self.store, DOC_KIND, &key)? {
            Some(raw) => {
                let old = decode_doc(raw)?;
                if old.title == title && old.text == text {
                    return Ok(old.db_time);
                }
                Some(old.db_time)
            }
            None => None,
        };
        let doc = Doc {
            id: id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            db_time: DbTime::ZERO,
        };
        let record = to_record(&doc)?;
        let t = timed::commit(&*self.store, |w| w.set(DOC_KIND, &key, &record, previous))?;
        debug!(%id, db_time = %t, "stored document");
        Ok(t)
    }

    /// Returns the document `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or decoded.
    pub fn get(&self, id: &str) -> CoreResult<Option<Doc>> {
        timed::get(&*self.store, DOC_KIND, &doc_key(id))?
            .map(decode_doc)
            .transpose()
    }

    /// Returns every document in id order.
    pub fn docs(&self) -> Docs<S> {
        Docs {
            inner: timed::scan(Arc::clone(&self.store), DOC_KIND, &[], None),
        }
    }

    /// Opens the watcher `name` over the corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher's mark cannot be read.
    pub fn watcher(&self, name: &str) -> CoreResult<Watcher<S, Doc>> {
        Watcher::new(Arc::clone(&self.store), name, DOC_KIND, decode_doc)
    }
}

/// Iterator returned by [`Corpus::docs`].
pub struct Docs<S: KvStore + ?Sized> {
    inner: TimedScan<S>,
}

impl<S: KvStore + ?Sized> Iterator for Docs<S> {
    type Item = CoreResult<Doc>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.inner.next()?.and_then(decode_doc))
    }
}
