//! Callback traits and run control
//!
//! These allow the engine to be used without depending on a specific
//! terminal UI: callers plug in their own progress display and prompt.

use crate::types::{Action, ReportEntry};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress callback for plan execution
///
/// All calls are made from the coordinating thread, even when operations
/// run on worker threads.
pub trait ProgressCallback {
    /// Called once before any operation starts
    fn on_plan_start(&mut self, total: usize);

    /// Called when an operation is handed to a worker
    fn on_operation_start(&mut self, resource_id: &str, action: Action);

    /// Called once per operation with its terminal outcome, including
    /// operations that were blocked or cancelled without starting
    fn on_operation_complete(&mut self, entry: &ReportEntry);

    /// Called after the last operation completes
    fn on_plan_complete(&mut self) {}
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_plan_start(&mut self, _total: usize) {}
    fn on_operation_start(&mut self, _resource_id: &str, _action: Action) {}
    fn on_operation_complete(&mut self, _entry: &ReportEntry) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> std::io::Result<bool> {
        Ok(false)
    }
}

/// Shared abort signal
///
/// Once cancelled, the executor starts no further operations; operations
/// already in flight finish and record their result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for wiring the token to a signal handler
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}
