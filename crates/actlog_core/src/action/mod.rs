//! Action log: durable lifecycle records with approval gating.
//!
//! ```text
//! ("timed", "action.Log") ++ handle  -> dbtime ++ CBOR(Entry)
//! ("action.ByCreated", nanos, dbtime) -> handle
//! handle = (kind,) ++ key
//! ```

mod entry;
mod log;
mod runner;

pub use entry::{Decision, Entry, EntryStatus};
pub use log::{handle, ActionLog, CreatedAfter, Entries, EntriesAfter, ACTION_KIND};
pub use runner::{ActionExecutor, ExecutorError, RunReport, Runner};
