//! Embedding documents into a vector store.

use crate::batch::{self, DriveStats};
use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::embed::{EmbedDoc, Embedder};
use crate::error::{SyncError, SyncResult};
use crate::vector::VectorDb;
use actlog_core::timed;
use actlog_core::{Corpus, Doc, Watcher, DOC_KIND};
use actlog_storage::{DbTime, KvStore};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statistics about sync runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that completed without error.
    pub runs_completed: u64,
    /// Documents embedded and marked by completed batches.
    pub docs_synced: u64,
    /// Batches completed.
    pub batches_flushed: u64,
    /// Retries made by [`DocSync::sync_with_retry`].
    pub retries: u64,
    /// Time of the last completed run.
    pub last_sync_time: Option<Instant>,
    /// Message of the last failed run.
    pub last_error: Option<String>,
}

/// Result of one successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Documents embedded.
    pub docs: usize,
    /// Batches flushed.
    pub batches: usize,
    /// Persisted watermark after the run.
    pub watermark: DbTime,
    /// Wall time of the run.
    pub duration: Duration,
}

/// Keeps a vector store in step with a document corpus.
///
/// Each run reads the documents changed since the watcher's mark, embeds
/// them in batches, writes the vectors, and then advances the mark past the
/// batch. Vectors are always written before the mark moves, so a crash can
/// only cause documents to be embedded again.
pub struct DocSync<S: KvStore + ?Sized, E: Embedder, V: VectorDb> {
    store: Arc<S>,
    watcher: Mutex<Watcher<S, Doc>>,
    embedder: E,
    vectors: V,
    config: SyncConfig,
    stats: RwLock<SyncStats>,
}

impl<S: KvStore + ?Sized, E: Embedder, V: VectorDb> DocSync<S, E, V> {
    /// Creates a pipeline from `corpus` into `vectors`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher's mark cannot be read.
    pub fn new(corpus: &Corpus<S>, embedder: E, vectors: V, config: SyncConfig) -> SyncResult<Self> {
        let watcher = corpus.watcher(&config.watcher_name)?;
        Ok(Self {
            store: Arc::clone(corpus.store()),
            watcher: Mutex::new(watcher),
            embedder,
            vectors,
            config,
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the vector destination.
    pub fn vectors(&self) -> &V {
        &self.vectors
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the persisted watermark of this pipeline's watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the mark cannot be read.
    pub fn latest(&self) -> SyncResult<DbTime> {
        Ok(timed::latest_mark(
            &*self.store,
            DOC_KIND,
            &self.config.watcher_name,
        )?)
    }

    /// Embeds every document changed since the last run.
    ///
    /// # Errors
    ///
    /// See [`DocSync::sync_with`].
    pub fn sync(&self) -> SyncResult<SyncReport> {
        self.sync_with(&CancelToken::new())
    }

    /// Embeds every document changed since the last run, stopping early if
    /// `cancel` is triggered.
    ///
    /// Batches completed before an error stay marked. Vectors the embedder
    /// returned for a failing batch are still written, but the mark does
    /// not move past that batch.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transform`] if the embedder reports a failure,
    /// [`SyncError::CountMismatch`] if it returns the wrong number of
    /// vectors, [`SyncError::Cancelled`] on cancellation, or a core error
    /// if reading documents or writing vectors fails.
    pub fn sync_with(&self, cancel: &CancelToken) -> SyncResult<SyncReport> {
        let start = Instant::now();
        let mut watcher = self.watcher.lock();
        info!(watcher = watcher.name(), from = %watcher.latest(), "sync started");

        let mut stats = DriveStats::default();
        let batch_size = self.config.batch_size;
        let result = batch::drive_counted(&mut *watcher, batch_size, &mut stats, |docs| {
            self.flush_batch(&docs, cancel)
        });
        if let Err(e) = result {
            warn!(
                watcher = watcher.name(),
                error = %e,
                mark = %watcher.latest(),
                completed = stats.batches,
                "sync failed"
            );
            let mut totals = self.stats.write();
            totals.docs_synced += stats.items as u64;
            totals.batches_flushed += stats.batches as u64;
            totals.last_error = Some(e.to_string());
            return Err(e);
        }

        let report = self.finish(stats, watcher.latest(), start.elapsed());
        info!(
            watcher = watcher.name(),
            docs = report.docs,
            batches = report.batches,
            watermark = %report.watermark,
            "sync completed"
        );
        Ok(report)
    }

    /// Runs [`DocSync::sync`], retrying retryable errors with backoff.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// error that is not retryable.
    pub fn sync_with_retry(&self) -> SyncResult<SyncReport> {
        let retry_config = &self.config.retry;
        let attempts = retry_config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.sync() {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    attempt += 1;
                    let delay = retry_config.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, error = %e, "sync failed, retrying");
                    std::thread::sleep(delay);
                    self.stats.write().retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn flush_batch(&self, docs: &[Doc], cancel: &CancelToken) -> SyncResult<()> {
        cancel.check()?;
        let inputs: Vec<EmbedDoc> = docs
            .iter()
            .map(|d| EmbedDoc {
                title: d.title.clone(),
                text: d.text.clone(),
            })
            .collect();
        let embedded = self.embedder.embed_docs(&inputs);
        cancel.check()?;

        let mut batch = self.vectors.batch();
        for (doc, vector) in docs.iter().zip(&embedded.vectors) {
            batch.set(&doc.id, vector);
        }
        let applied = batch.len();
        batch.apply()?;
        drop(batch);
        self.vectors.flush()?;
        debug!(inputs = docs.len(), applied, "vectors written");

        if let Some(message) = embedded.error {
            return Err(SyncError::transform(message, applied));
        }
        if embedded.vectors.len() != docs.len() {
            return Err(SyncError::CountMismatch {
                inputs: docs.len(),
                outputs: embedded.vectors.len(),
            });
        }
        Ok(())
    }

    fn finish(&self, stats: DriveStats, watermark: DbTime, duration: Duration) -> SyncReport {
        let mut totals = self.stats.write();
        totals.runs_completed += 1;
        totals.docs_synced += stats.items as u64;
        totals.batches_flushed += stats.batches as u64;
        totals.last_sync_time = Some(Instant::now());
        totals.last_error = None;
        SyncReport {
            docs: stats.items,
            batches: stats.batches,
            watermark,
            duration,
        }
    }
}

/// Returns the persisted watermark of the watcher `name` over `corpus`.
///
/// # Errors
///
/// Returns an error if the mark cannot be read.
pub fn latest<S: KvStore + ?Sized>(corpus: &Corpus<S>, name: &str) -> SyncResult<DbTime> {
    Ok(timed::latest_mark(&**corpus.store(), DOC_KIND, name)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::embed::Embedded;
    use crate::vector::StoreVectorDb;
    use actlog_storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LenEmbedder;

    impl Embedder for LenEmbedder {
        fn embed_docs(&self, docs: &[EmbedDoc]) -> Embedded {
            Embedded::ok(docs.iter().map(|d| vec![d.text.len() as f32]).collect())
        }
    }

    struct FlakyEmbedder {
        failures: AtomicUsize,
    }

    impl Embedder for FlakyEmbedder {
        fn embed_docs(&self, docs: &[EmbedDoc]) -> Embedded {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Embedded::failed(Vec::new(), "rate limited");
            }
            LenEmbedder.embed_docs(docs)
        }
    }

    /// Succeeds for the first `ok_calls` calls, then fails.
    struct FailAfter {
        ok_calls: usize,
        calls: AtomicUsize,
    }

    impl Embedder for FailAfter {
        fn embed_docs(&self, docs: &[EmbedDoc]) -> Embedded {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
                return Embedded::failed(Vec::new(), "quota exceeded");
            }
            LenEmbedder.embed_docs(docs)
        }
    }

    fn corpus() -> Corpus<MemoryStore> {
        Corpus::new(Arc::new(MemoryStore::new()))
    }

    fn no_delay(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts)
            .with_base_delay(Duration::ZERO)
            .with_delay_cap(Duration::ZERO)
    }

    #[test]
    fn sync_updates_stats() {
        let corpus = corpus();
        corpus.add("a", "", "one").unwrap();
        corpus.add("b", "", "three").unwrap();
        let vectors = StoreVectorDb::new(Arc::clone(corpus.store()));
        let sync = DocSync::new(&corpus, LenEmbedder, vectors, SyncConfig::default()).unwrap();

        let report = sync.sync().unwrap();
        assert_eq!(report.docs, 2);
        assert_eq!(report.batches, 1);
        assert_eq!(report.watermark, sync.latest().unwrap());
        assert_eq!(latest(&corpus, "embeddocs").unwrap(), report.watermark);

        let stats = sync.stats();
        assert_eq!(stats.runs_completed, 1);
        assert_eq!(stats.docs_synced, 2);
        assert!(stats.last_sync_time.is_some());
        assert_eq!(sync.vectors().get("b").unwrap(), Some(vec![5.0]));
    }

    #[test]
    fn failed_run_counts_completed_batches() {
        let corpus = corpus();
        for id in ["a", "b", "c"] {
            corpus.add(id, "", "text").unwrap();
        }
        let embedder = FailAfter {
            ok_calls: 2,
            calls: AtomicUsize::new(0),
        };
        let config = SyncConfig::default()
            .with_batch_size(1)
            .with_retry(RetryConfig::no_retry());
        let vectors = StoreVectorDb::new(Arc::clone(corpus.store()));
        let sync = DocSync::new(&corpus, embedder, vectors, config).unwrap();

        assert!(sync.sync().is_err());
        let stats = sync.stats();
        assert_eq!(stats.runs_completed, 0);
        assert_eq!(stats.docs_synced, 2);
        assert_eq!(stats.batches_flushed, 2);
        assert!(stats.last_error.is_some());
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let corpus = corpus();
        corpus.add("a", "", "one").unwrap();
        let embedder = FlakyEmbedder {
            failures: AtomicUsize::new(2),
        };
        let config = SyncConfig::default().with_retry(no_delay(3));
        let vectors = StoreVectorDb::new(Arc::clone(corpus.store()));
        let sync = DocSync::new(&corpus, embedder, vectors, config).unwrap();

        let report = sync.sync_with_retry().unwrap();
        assert_eq!(report.docs, 1);
        assert_eq!(sync.stats().retries, 2);
        assert!(sync.stats().last_error.is_none());
    }

    #[test]
    fn retry_gives_up() {
        let corpus = corpus();
        corpus.add("a", "", "one").unwrap();
        let embedder = FlakyEmbedder {
            failures: AtomicUsize::new(5),
        };
        let config = SyncConfig::default().with_retry(no_delay(2));
        let vectors = StoreVectorDb::new(Arc::clone(corpus.store()));
        let sync = DocSync::new(&corpus, embedder, vectors, config).unwrap();

        let err = sync.sync_with_retry().unwrap_err();
        assert!(matches!(err, SyncError::Transform { .. }));
        assert_eq!(sync.stats().retries, 1);
        assert_eq!(sync.latest().unwrap(), DbTime::ZERO);
        assert!(sync.stats().last_error.is_some());
    }
}
