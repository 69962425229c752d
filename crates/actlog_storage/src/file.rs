//! Journal-backed persistent store.
//!
//! The store directory holds:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK           # Advisory lock for single-writer
//! └─ journal.log    # Append-only log of applied batches
//! ```
//!
//! The ordered map lives in memory and is rebuilt from the journal on
//! open. A torn tail left by a crash mid-append is truncated.

use crate::batch::{BatchOp, WriteBatch};
use crate::config::StoreConfig;
use crate::error::{StorageError, StorageResult};
use crate::journal;
use crate::memory::{apply_ops, page};
use crate::store::{DbTime, KvStore, Timestamps};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";

#[derive(Debug)]
struct Inner {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    clock: DbTime,
    journal: File,
    size: u64,
}

/// A persistent ordered store.
///
/// Every applied batch is appended to a checksummed journal before it
/// becomes visible. Data survives process restarts.
///
/// # Durability
///
/// - With `sync_on_commit`, each batch is fsynced before `apply` returns
/// - `flush()` always calls `File::sync_all()`
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads. Only one
/// `FileStore` may hold a directory at a time; a second open fails with
/// [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use actlog_storage::{FileStore, KvStore, StoreConfig};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("actions.db"), StoreConfig::default()).unwrap();
/// store.set(b"key", b"value").unwrap();
/// store.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    config: StoreConfig,
    inner: RwLock<Inner>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - The journal header or an intact record is corrupted
    /// - I/O errors occur
    pub fn open(path: &Path, config: StoreConfig) -> StorageResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::NotFound {
                    path: path.display().to_string(),
                });
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let mut journal = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path.join(JOURNAL_FILE))?;
        let mut data = Vec::new();
        journal.read_to_end(&mut data)?;

        let mut map = BTreeMap::new();
        let mut clock = DbTime::ZERO;
        let replay = journal::replay(&data)?;
        if replay.torn {
            warn!(
                path = %path.display(),
                valid_len = replay.valid_len,
                discarded = data.len() as u64 - replay.valid_len,
                "truncating torn journal tail"
            );
            journal.set_len(replay.valid_len)?;
            journal.sync_all()?;
        }
        for record in replay.records {
            clock = clock.max(record.clock);
            apply_ops(&mut map, record.ops);
        }
        let size = if replay.valid_len == 0 {
            journal.write_all(&journal::header())?;
            journal.sync_all()?;
            journal::HEADER_SIZE as u64
        } else {
            replay.valid_len
        };

        debug!(path = %path.display(), keys = map.len(), %clock, "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            inner: RwLock::new(Inner {
                map,
                clock,
                journal,
                size,
            }),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal size in bytes.
    #[must_use]
    pub fn journal_size(&self) -> u64 {
        self.inner.read().size
    }

    /// Appends a record and then applies its operations to the map.
    fn commit(&self, inner: &mut Inner, clock: DbTime, ops: Vec<BatchOp>) -> StorageResult<()> {
        let record = journal::encode_record(clock, &ops)?;
        inner.size = append(
            &mut inner.journal,
            inner.size,
            &record,
            self.config.sync_on_commit,
        )?;
        apply_ops(&mut inner.map, ops);
        inner.clock = clock;
        Ok(())
    }
}

/// The file operations a journal append needs.
trait JournalFile {
    fn write_record(&mut self, buf: &[u8]) -> std::io::Result<()>;
    fn sync_record(&mut self) -> std::io::Result<()>;
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
}

impl JournalFile for File {
    fn write_record(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.write_all(buf)
    }

    fn sync_record(&mut self) -> std::io::Result<()> {
        self.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

/// Appends `record` at `size` and returns the new journal size.
///
/// On a failed write or sync the journal is cut back to `size`, so a
/// batch reported as failed is never replayed.
fn append<J: JournalFile>(
    journal: &mut J,
    size: u64,
    record: &[u8],
    sync: bool,
) -> StorageResult<u64> {
    let result = journal
        .write_record(record)
        .and_then(|()| if sync { journal.sync_record() } else { Ok(()) });
    if let Err(e) = result {
        if let Err(trunc) = journal.truncate_to(size) {
            warn!(size, error = %trunc, "failed to cut back journal after failed append");
        }
        return Err(e.into());
    }
    Ok(size + record.len() as u64)
}

impl KvStore for FileStore {
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
        if batch.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();
        let clock = inner.clock;
        self.commit(&mut inner, clock, batch.into_ops())
    }

    fn apply_timed(
        &self,
        build: &mut dyn FnMut(&mut Timestamps) -> WriteBatch,
    ) -> StorageResult<DbTime> {
        let mut inner = self.inner.write();
        let mut stamps = Timestamps::starting_after(inner.clock);
        let batch = build(&mut stamps);
        let clock = stamps.last();
        if batch.is_empty() && clock == inner.clock {
            return Ok(clock);
        }
        self.commit(&mut inner, clock, batch.into_ops())?;
        Ok(clock)
    }

    fn last_time(&self) -> DbTime {
        self.inner.read().clock
    }

    fn page_size(&self) -> usize {
        self.config.scan_page_size
    }

    fn flush(&self) -> StorageResult<()> {
        self.inner.write().journal.sync_all()?;
        Ok(())
    }
}
