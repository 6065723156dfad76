//! Page driver capability.
//!
//! Whatever drives a real page (a browser, a crawler, a fixture in tests)
//! sits behind these traits. Implementations carry their own per-call
//! timeouts; a timeout surfaces as `DriverError::Timeout` and is handled
//! as a recoverable action failure, never a worker-fatal error.

use crate::action::Action;
use crate::page::{PageEvent, PageState};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to create page session: {reason}")]
    Session { reason: String },
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("action `{action}` failed: {reason}")]
    ActionFailed { action: String, reason: String },
    #[error("page operation `{operation}` timed out")]
    Timeout { operation: String },
}

/// One exclusive page session. Never shared between workers.
pub trait PageDriver: Send {
    /// Capture the current page as a structured snapshot.
    fn observe(&mut self, worker_id: u32) -> Result<PageState, DriverError>;

    /// Execute one action against the live page.
    fn perform(&mut self, action: &Action) -> Result<(), DriverError>;

    /// Hand over the bounded, time-ordered events (script errors, console
    /// errors, failed responses) collected since the last drain. Called
    /// synchronously right after `observe()`.
    fn drain_events(&mut self) -> Vec<PageEvent>;

    fn current_url(&self) -> String;

    /// Release the session's resources. Must be safe to call exactly once
    /// on every worker exit path.
    fn close(&mut self);
}

pub trait PageDriverFactory: Send + Sync {
    fn create_session(&self, worker_id: u32) -> Result<Box<dyn PageDriver>, DriverError>;
}
