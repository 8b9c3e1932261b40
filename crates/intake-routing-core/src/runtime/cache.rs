// crates/intake-routing-core/src/runtime/cache.rs
// ============================================================================
// Module: Inference Cache
// Description: Content-addressed cache for LLM inference artifacts.
// Purpose: Make LLM output replayable and enforce determinism mode.
// Dependencies: crate::core::{hashing, inference}
// ============================================================================

//! ## Overview
//! The inference cache is keyed by the canonical inference identity. A hit
//! returns the stored artifact without contacting any provider. Entries are
//! content-addressed, so concurrent insertion of the same key is harmless.
//! Eviction never breaks replay: the key is re-derivable from the inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::inference::LlmInferenceArtifact;

// ============================================================================
// SECTION: Cache Interface
// ============================================================================

/// Inference cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache backend reported an error.
    #[error("inference cache error: {0}")]
    Store(String),
}

/// Content-addressed inference cache.
pub trait InferenceCache {
    /// Looks up an artifact by cache key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    fn lookup(&self, key: &HashDigest) -> Result<Option<LlmInferenceArtifact>, CacheError>;

    /// Records an artifact under its cache key. Recording an existing key is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    fn record(&self, key: &HashDigest, artifact: &LlmInferenceArtifact) -> Result<(), CacheError>;
}

// ============================================================================
// SECTION: In-Memory Cache
// ============================================================================

/// In-memory inference cache for tests and embedded use.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInferenceCache {
    /// Entries keyed by hex cache key.
    entries: Arc<Mutex<BTreeMap<String, LlmInferenceArtifact>>>,
}

impl InMemoryInferenceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InferenceCache for InMemoryInferenceCache {
    fn lookup(&self, key: &HashDigest) -> Result<Option<LlmInferenceArtifact>, CacheError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| CacheError::Store("inference cache mutex poisoned".to_string()))?;
        Ok(guard.get(key.as_hex()).cloned())
    }

    fn record(&self, key: &HashDigest, artifact: &LlmInferenceArtifact) -> Result<(), CacheError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CacheError::Store("inference cache mutex poisoned".to_string()))?;
        guard.entry(key.as_hex().to_string()).or_insert_with(|| artifact.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Cache Wrapper
// ============================================================================

/// Shared inference cache backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedInferenceCache {
    /// Inner cache implementation.
    inner: Arc<dyn InferenceCache + Send + Sync>,
}

impl SharedInferenceCache {
    /// Wraps a cache in a shared, clonable wrapper.
    #[must_use]
    pub fn from_cache(cache: impl InferenceCache + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(cache),
        }
    }
}

impl InferenceCache for SharedInferenceCache {
    fn lookup(&self, key: &HashDigest) -> Result<Option<LlmInferenceArtifact>, CacheError> {
        self.inner.lookup(key)
    }

    fn record(&self, key: &HashDigest, artifact: &LlmInferenceArtifact) -> Result<(), CacheError> {
        self.inner.record(key, artifact)
    }
}
