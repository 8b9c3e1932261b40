// crates/intake-routing-core/src/core/hashing.rs
// ============================================================================
// Module: Intake Routing Content Hashing
// Description: SHA-256 digests over canonical JSON and raw bytes.
// Purpose: Give artifacts, decisions, job keys, and audit chains one digest type.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! The system contract pins SHA-256 for every content address, so the
//! digest type carries no algorithm tag: a [`HashDigest`] is sixty-four
//! lowercase hex characters, full stop. JSON inputs are canonicalized with
//! RFC 8785 (JCS) before hashing so key order and numeric spelling never
//! move a digest; binary payloads hash over their raw bytes. Digests read
//! from the wire are validated fail-closed before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing or parsing digests.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// Canonical JSON exceeded the configured size limit.
    #[error("canonical json size {actual} exceeds limit {limit}")]
    SizeLimitExceeded {
        /// Configured size limit in bytes.
        limit: usize,
        /// Actual canonical size in bytes.
        actual: usize,
    },
    /// A wire value is not a well-formed SHA-256 hex digest.
    #[error("malformed sha-256 digest: {0}")]
    MalformedDigest(String),
}

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Hex length of a SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 content digest with a transparent lowercase-hex wire form.
///
/// # Invariants
/// - Always exactly 64 lowercase hex characters; deserialization enforces
///   this, so a malformed digest can never enter an artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl<'de> Deserialize<'de> for HashDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(hex).map_err(serde::de::Error::custom)
    }
}

impl HashDigest {
    /// Hashes raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(DIGEST_HEX_LEN);
        for byte in digest {
            // Infallible for String targets.
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Hashes a serializable value over its RFC 8785 canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails.
    pub fn of_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HashError> {
        let bytes = canonical_json_bytes(value)?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Hashes a serializable value, rejecting canonical forms larger than
    /// `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails and
    /// [`HashError::SizeLimitExceeded`] when the canonical form exceeds
    /// `limit`.
    pub fn of_canonical_json_bounded<T: Serialize + ?Sized>(
        value: &T,
        limit: usize,
    ) -> Result<Self, HashError> {
        let bytes = canonical_json_bytes(value)?;
        if bytes.len() > limit {
            return Err(HashError::SizeLimitExceeded {
                limit,
                actual: bytes.len(),
            });
        }
        Ok(Self::of_bytes(&bytes))
    }

    /// Validates and wraps a hex digest read from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::MalformedDigest`] unless the value is exactly 64
    /// lowercase hex characters.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, HashError> {
        let hex = hex.into();
        let well_formed = hex.len() == DIGEST_HEX_LEN
            && hex.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase());
        if well_formed {
            Ok(Self(hex))
        } else {
            Err(HashError::MalformedDigest(hex))
        }
    }

    /// Returns the lowercase hex form.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Canonical Bytes
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}
