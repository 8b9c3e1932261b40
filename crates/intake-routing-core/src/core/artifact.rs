// crates/intake-routing-core/src/core/artifact.rs
// ============================================================================
// Module: Artifact References
// Description: Content-addressed artifact references shared by all stages.
// Purpose: Let components hold immutable handles instead of raw artifact bytes.
// Dependencies: crate::core::{hashing, registry}, serde
// ============================================================================

//! ## Overview
//! Every persisted artifact is referenced by `{schema_id, uri, sha256}`.
//! Components never hold mutable artifact state; they exchange references
//! and resolve bytes through the artifact store. The schema identifier must
//! be one of the canonical registry URNs or validation fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::registry::ALL_SCHEMA_URNS;

// ============================================================================
// SECTION: Artifact Reference
// ============================================================================

/// Immutable reference to a persisted, content-addressed artifact.
///
/// # Invariants
/// - `sha256` is the digest of the exact bytes stored under `uri`.
/// - `schema_id` is a canonical registry URN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Canonical schema URN the artifact validates against.
    pub schema_id: String,
    /// Store-relative artifact URI.
    pub uri: String,
    /// Content hash of the artifact bytes.
    pub sha256: HashDigest,
}

impl ArtifactRef {
    /// Builds a reference for artifact bytes under a schema and URI.
    #[must_use]
    pub fn for_bytes(schema_id: impl Into<String>, uri: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            schema_id: schema_id.into(),
            uri: uri.into(),
            sha256: HashDigest::of_bytes(bytes),
        }
    }

    /// Validates that the reference carries a canonical schema URN.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactRefError::UnknownSchema`] for non-canonical URNs.
    pub fn validate_schema(&self) -> Result<(), ArtifactRefError> {
        if ALL_SCHEMA_URNS.contains(&self.schema_id.as_str()) {
            Ok(())
        } else {
            Err(ArtifactRefError::UnknownSchema(self.schema_id.clone()))
        }
    }

    /// Validates that the reference names the expected schema URN.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactRefError`] on unknown or mismatched schemas.
    pub fn expect_schema(&self, expected: &str) -> Result<(), ArtifactRefError> {
        self.validate_schema()?;
        if self.schema_id == expected {
            Ok(())
        } else {
            Err(ArtifactRefError::SchemaMismatch {
                expected: expected.to_string(),
                actual: self.schema_id.clone(),
            })
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact reference validation errors.
#[derive(Debug, Error)]
pub enum ArtifactRefError {
    /// Schema URN is not in the canonical registry.
    #[error("unknown schema urn: {0}")]
    UnknownSchema(String),
    /// Schema URN does not match the expected artifact type.
    #[error("schema mismatch (expected {expected}, got {actual})")]
    SchemaMismatch {
        /// Expected schema URN.
        expected: String,
        /// Actual schema URN on the reference.
        actual: String,
    },
}
