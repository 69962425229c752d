//! Action log records.

use actlog_storage::DbTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// A named party's vote on an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Who decided.
    pub name: String,
    /// When the decision was made.
    pub time: SystemTime,
    /// True for approval, false for denial.
    pub approved: bool,
}

impl Decision {
    /// Creates a decision.
    pub fn new(name: impl Into<String>, time: SystemTime, approved: bool) -> Self {
        Self {
            name: name.into(),
            time,
            approved,
        }
    }

    /// An approval by `name`, made now.
    pub fn approve(name: impl Into<String>) -> Self {
        Self::new(name, SystemTime::now(), true)
    }

    /// A denial by `name`, made now.
    pub fn deny(name: impl Into<String>) -> Self {
        Self::new(name, SystemTime::now(), false)
    }
}

/// Lifecycle state of an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// Not done and free to run.
    Pending,
    /// Needs approval and has none yet.
    AwaitingApproval,
    /// Needs approval and was denied; it will never run.
    Denied,
    /// Done without error.
    Succeeded,
    /// Done with an error.
    Failed,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Pending => "pending",
            EntryStatus::AwaitingApproval => "awaiting-approval",
            EntryStatus::Denied => "denied",
            EntryStatus::Succeeded => "succeeded",
            EntryStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One action's durable lifecycle record.
///
/// `(kind, key)` identifies the entry. `created` and `approval_required`
/// are fixed by the first write, `decisions` only grows, and `done` goes
/// from false to true once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Wall-clock time of the first write.
    pub created: SystemTime,
    /// Action type.
    pub kind: String,
    /// Ordered-encoded key, unique within `kind`.
    pub key: Vec<u8>,
    /// Opaque description of what to do.
    pub action: Vec<u8>,
    /// Whether the action needs approval before running.
    pub approval_required: bool,
    /// Votes, in the order they were added.
    pub decisions: Vec<Decision>,
    /// Whether the action has completed.
    pub done: bool,
    /// Opaque result, set on completion.
    pub result: Vec<u8>,
    /// Error message, set on failed completion. Empty means success.
    pub error: String,
    /// Wall-clock time of the last mutation.
    pub mod_time: SystemTime,
    /// Store time of the last write. Not part of the stored record.
    #[serde(skip)]
    pub db_time: DbTime,
}

impl Entry {
    /// Reports whether the action may run.
    ///
    /// Actions that need no approval are always approved. Otherwise at
    /// least one approval is needed and a single denial vetoes.
    #[must_use]
    pub fn approved(&self) -> bool {
        if !self.approval_required {
            return true;
        }
        let mut approved = false;
        for d in &self.decisions {
            if !d.approved {
                return false;
            }
            approved = true;
        }
        approved
    }

    /// Returns the entry's lifecycle state.
    #[must_use]
    pub fn status(&self) -> EntryStatus {
        if self.done {
            return if self.error.is_empty() {
                EntryStatus::Succeeded
            } else {
                EntryStatus::Failed
            };
        }
        if self.approved() {
            EntryStatus::Pending
        } else if self.decisions.iter().any(|d| !d.approved) {
            EntryStatus::Denied
        } else {
            EntryStatus::AwaitingApproval
        }
    }
}
