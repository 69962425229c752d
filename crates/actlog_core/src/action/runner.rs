//! Executing approved actions.

use super::entry::Entry;
use super::log::{handle, ActionLog};
use crate::error::{CoreError, CoreResult};
use actlog_storage::KvStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by an [`ActionExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutorError {
    message: String,
}

impl ExecutorError {
    /// Creates an executor error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Performs the actions of one kind.
pub trait ActionExecutor: Send + Sync {
    /// Runs `action` and returns its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the action failed. The error message is
    /// recorded on the entry.
    fn run(&self, action: &[u8]) -> Result<Vec<u8>, ExecutorError>;
}

impl<F> ActionExecutor for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, ExecutorError> + Send + Sync,
{
    fn run(&self, action: &[u8]) -> Result<Vec<u8>, ExecutorError> {
        self(action)
    }
}

/// Counts from one [`Runner::run_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Actions run to success.
    pub executed: usize,
    /// Actions run that returned an error.
    pub failed: usize,
    /// Actions still waiting for an approval.
    pub awaiting_approval: usize,
    /// Actions vetoed by a denial.
    pub denied: usize,
    /// Approved actions whose kind has no executor.
    pub unregistered: usize,
}

/// Runs approved, unfinished actions and records their outcomes.
pub struct Runner<S: KvStore + ?Sized> {
    log: Arc<ActionLog<S>>,
    executors: HashMap<String, Box<dyn ActionExecutor>>,
}

impl<S: KvStore + ?Sized> Runner<S> {
    /// Creates a runner with no executors.
    pub fn new(log: Arc<ActionLog<S>>) -> Self {
        Self {
            log,
            executors: HashMap::new(),
        }
    }

    /// Registers the executor for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<String>, executor: impl ActionExecutor + 'static) {
        self.executors.insert(kind.into(), Box::new(executor));
    }

    /// Walks every entry and runs the ones that are approved and not done.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be scanned or an outcome cannot
    /// be recorded. Executor failures are recorded, not returned.
    pub fn run_pending(&self) -> CoreResult<RunReport> {
        let mut report = RunReport::default();
        for entry in self.log.scan_all() {
            let entry = entry?;
            if entry.done {
                continue;
            }
            if !entry.approved() {
                if entry.decisions.iter().any(|d| !d.approved) {
                    report.denied += 1;
                } else {
                    report.awaiting_approval += 1;
                }
                continue;
            }
            let Some(executor) = self.executors.get(&entry.kind) else {
                debug!(kind = %entry.kind, "no executor for kind");
                report.unregistered += 1;
                continue;
            };
            if self.execute(executor.as_ref(), &entry)? {
                report.executed += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(
            executed = report.executed,
            failed = report.failed,
            awaiting = report.awaiting_approval,
            "run pass finished"
        );
        Ok(report)
    }

    /// Runs the single action `(kind, key)` and returns its completed entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry does not exist,
    /// `ExecutorNotRegistered` if its kind has no executor, and
    /// `InvalidOperation` if it is already done or not approved.
    pub fn run_one(&self, kind: &str, key: &[u8]) -> CoreResult<Entry> {
        let entry = self
            .log
            .get(kind, key)?
            .ok_or_else(|| CoreError::not_found(kind, key))?;
        if entry.done {
            return Err(CoreError::invalid_operation("action already done"));
        }
        if !entry.approved() {
            return Err(CoreError::invalid_operation("action not approved"));
        }
        let executor = self
            .executors
            .get(kind)
            .ok_or_else(|| CoreError::ExecutorNotRegistered {
                kind: kind.to_string(),
            })?;
        self.execute(executor.as_ref(), &entry)?;
        self.log
            .get(kind, key)?
            .ok_or_else(|| CoreError::not_found(kind, key))
    }

    fn execute(&self, executor: &dyn ActionExecutor, entry: &Entry) -> CoreResult<bool> {
        let h = handle(&entry.kind, &entry.key);
        match executor.run(&entry.action) {
            Ok(result) => {
                self.log.complete(&h, &result, None)?;
                Ok(true)
            }
            Err(e) => {
                warn!(kind = %entry.kind, error = %e, "action failed");
                self.log.complete(&h, &[], Some(&e as &dyn fmt::Display))?;
                Ok(false)
            }
        }
    }
}

impl<S: KvStore + ?Sized> fmt::Debug for Runner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.executors.keys().collect();
        kinds.sort();
        f.debug_struct("Runner").field("kinds", &kinds).finish_non_exhaustive()
    }
}
