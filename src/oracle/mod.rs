//! Decision oracle capability.
//!
//! An oracle maps a page snapshot plus recent exploration context to the
//! next proposed action. A transport failure or timeout is retried with
//! exponential backoff; a malformed response is returned immediately,
//! because a response *was* produced and retrying would hide the
//! malfunction from operators.

use crate::action::Action;
use crate::page::{PageState, PageSummary};
use std::time::Duration;

pub mod ollama;

pub use ollama::OllamaOracle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    Action(Action),
    /// The oracle deliberately produced `{"type":"none"}`.
    Decline,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("oracle call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("oracle response malformed: {reason}")]
    Malformed { reason: String },
}

pub trait DecisionOracle: Send + Sync {
    fn propose(
        &self,
        state: &PageState,
        recent: &[PageSummary],
        actions_taken: u32,
    ) -> Result<Proposal, OracleError>;
}

/// Bounded retries for transient oracle failures. `base_backoff` doubles
/// per attempt (1x, 2x, 4x, ...); pass `Duration::ZERO` in tests.
pub fn propose_with_retry(
    oracle: &dyn DecisionOracle,
    state: &PageState,
    recent: &[PageSummary],
    actions_taken: u32,
    max_attempts: u32,
    base_backoff: Duration,
) -> Result<Proposal, OracleError> {
    let attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match oracle.propose(state, recent, actions_taken) {
            Ok(proposal) => return Ok(proposal),
            Err(err @ OracleError::Malformed { .. }) => return Err(err),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "oracle call failed");
                last_error = Some(err);
                if attempt + 1 < attempts {
                    std::thread::sleep(base_backoff * 2_u32.saturating_pow(attempt.min(10)));
                }
            }
        }
    }

    Err(last_error.unwrap_or(OracleError::Unavailable {
        reason: "no attempts were made".to_string(),
    }))
}
