// crates/intake-routing-core/src/core/time.rs
// ============================================================================
// Module: Intake Routing Time Model
// Description: Caller-supplied wall-clock instants for ingest and audit records.
// Purpose: Keep every timestamp explicit so replay stays deterministic.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Timestamps enter the pipeline exactly twice: stamped by the ingest
//! adapter on the raw message and by the worker on audit events. The core
//! never reads a clock itself, and no timestamp ever participates in
//! decision hashing (the decision hasher rejects `*_at` members outright).
//! The representation is a plain epoch-millisecond count with a transparent
//! wire form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Milliseconds since the Unix epoch, supplied by the caller.
///
/// # Invariants
/// - Values are explicitly provided by adapters and workers; the core never
///   reads wall-clock time.
/// - Ordering follows the numeric value; monotonicity within a run is a
///   caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch itself; useful as a neutral lower bound.
    pub const UNIX_EPOCH: Self = Self(0);

    /// Creates a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the epoch-millisecond value.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the later of two timestamps.
    #[must_use]
    pub const fn later_of(self, other: Self) -> Self {
        if self.0 >= other.0 { self } else { other }
    }

    /// Returns the elapsed milliseconds since an earlier timestamp, or zero
    /// when `earlier` is not actually earlier.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta < 0 { 0 } else { delta as u64 }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
