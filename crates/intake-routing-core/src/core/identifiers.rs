// crates/intake-routing-core/src/core/identifiers.rs
// ============================================================================
// Module: Intake Routing Identifiers
// Description: Canonical opaque identifiers for messages, runs, and artifacts.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout the intake
//! routing engine. Identifiers are opaque UTF-8 strings that serialize
//! transparently on the wire. None of them participate in decision hashing
//! except `MessageId`; run- and event-scoped identifiers are explicitly
//! excluded from canonical decision inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier newtype with the canonical surface.
macro_rules! string_identifier {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier! {
    /// Message identifier assigned at ingest, stable across runs.
    MessageId
}

string_identifier! {
    /// Run identifier for one pipeline execution of one message.
    RunId
}

string_identifier! {
    /// Audit event identifier, unique within a run chain.
    EventId
}

string_identifier! {
    /// Attachment identifier scoped to a message.
    AttachmentId
}

string_identifier! {
    /// Directory entity identifier (customer, policy, claim, contact, broker).
    EntityId
}

string_identifier! {
    /// Deterministic per-stage job identifier enforcing idempotent writes.
    JobId
}

string_identifier! {
    /// Routing rule identifier within a versioned ruleset.
    RuleId
}

string_identifier! {
    /// Correction record identifier.
    CorrectionId
}

string_identifier! {
    /// Review item identifier referencing a HITL work item.
    ReviewItemId
}

string_identifier! {
    /// Reviewer or operator identifier recorded on corrections.
    ActorId
}

string_identifier! {
    /// Model identifier for LLM inference artifacts.
    ModelId
}
