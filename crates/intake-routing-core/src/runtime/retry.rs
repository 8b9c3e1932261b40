// crates/intake-routing-core/src/runtime/retry.rs
// ============================================================================
// Module: Bounded Deterministic Retry
// Description: Fixed-attempt retry wrapper for external I/O calls.
// Purpose: Keep transient dependency failures from failing decision stages.
// Dependencies: crate::core::snapshot
// ============================================================================

//! ## Overview
//! External I/O (directory, AV, OCR, LLM, case adapter) retries with a fixed
//! attempt budget and a fixed backoff sequence from configuration. Decision
//! logic is never retried; a logic failure fails closed immediately. Pacing
//! between attempts is delegated to a [`Backoff`] hook so tests stay
//! instantaneous and deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::snapshot::IoConfig;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Bounded retry policy with a fixed backoff sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub attempts: u32,
    /// Backoff in milliseconds before each retry.
    pub backoff_ms: Vec<u64>,
}

impl RetryPolicy {
    /// Builds the policy from the I/O configuration section.
    #[must_use]
    pub fn from_io(io: &IoConfig) -> Self {
        Self {
            attempts: io.retry_attempts.max(1),
            backoff_ms: io.retry_backoff_ms.clone(),
        }
    }
}

// ============================================================================
// SECTION: Backoff Hook
// ============================================================================

/// Pacing hook invoked between attempts.
pub trait Backoff {
    /// Waits for the given backoff duration before the next attempt.
    fn wait(&self, millis: u64);
}

/// No-op backoff for tests and embedded use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackoff;

impl Backoff for NoopBackoff {
    fn wait(&self, _millis: u64) {}
}

/// Thread-sleeping backoff for worker deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepBackoff;

impl Backoff for SleepBackoff {
    fn wait(&self, millis: u64) {
        std::thread::sleep(std::time::Duration::from_millis(millis));
    }
}

// ============================================================================
// SECTION: Retry Execution
// ============================================================================

/// Runs an operation under the retry policy.
///
/// `is_transient` classifies errors: non-transient errors return
/// immediately, transient ones consume attempts. The final transient error
/// is returned once the budget is exhausted.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub fn with_retry<T, E, F>(
    policy: &RetryPolicy,
    backoff: &dyn Backoff,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.attempts || !is_transient(&err) {
                    return Err(err);
                }
                let backoff_index = usize::try_from(attempt - 1).unwrap_or(usize::MAX);
                let wait_ms = policy
                    .backoff_ms
                    .get(backoff_index)
                    .copied()
                    .or_else(|| policy.backoff_ms.last().copied())
                    .unwrap_or(0);
                backoff.wait(wait_ms);
            }
        }
    }
}
