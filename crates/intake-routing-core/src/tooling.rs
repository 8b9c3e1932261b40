// crates/intake-routing-core/src/tooling.rs
// ============================================================================
// Module: Verification Tooling
// Description: Exit codes and taxonomy mapping for verification utilities.
// Purpose: Give operational tools a stable process-exit contract.
// Dependencies: crate::core::error
// ============================================================================

//! ## Overview
//! Verification utilities (chain verifiers, replay checkers, config
//! validators) exit with stable codes so operators and CI can branch on the
//! outcome without parsing output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::error::ErrorKind;

// ============================================================================
// SECTION: Exit Codes
// ============================================================================

/// Verification succeeded.
pub const EXIT_OK: u8 = 0;
/// Input was malformed or unreadable.
pub const EXIT_INVALID_INPUT: u8 = 10;
/// Schema validation failed.
pub const EXIT_SCHEMA_VALIDATION: u8 = 20;
/// A fail-closed outcome is required.
pub const EXIT_FAIL_CLOSED_REQUIRED: u8 = 30;
/// A dependency was unavailable.
pub const EXIT_DEPENDENCY_UNAVAILABLE: u8 = 40;
/// A security policy was violated.
pub const EXIT_SECURITY_POLICY: u8 = 50;
/// Integrity or pack verification failed.
pub const EXIT_INTEGRITY: u8 = 60;

/// Maps an error kind to the verification exit code.
#[must_use]
pub const fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => EXIT_SCHEMA_VALIDATION,
        ErrorKind::SafetyOverride => EXIT_SECURITY_POLICY,
        ErrorKind::DependencyUnavailable => EXIT_DEPENDENCY_UNAVAILABLE,
        ErrorKind::DeterminismViolation => EXIT_FAIL_CLOSED_REQUIRED,
        ErrorKind::Integrity => EXIT_INTEGRITY,
        ErrorKind::Internal => EXIT_INVALID_INPUT,
    }
}
