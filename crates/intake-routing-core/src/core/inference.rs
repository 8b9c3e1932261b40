// crates/intake-routing-core/src/core/inference.rs
// ============================================================================
// Module: LLM Inference Artifacts
// Description: Immutable inference artifacts and their content-addressed keys.
// Purpose: Make LLM output replayable through the inference cache.
// Dependencies: crate::core::{hashing, identifiers}, serde, serde_json
// ============================================================================

//! ## Overview
//! Each LLM call writes exactly one immutable artifact keyed by the full
//! inference identity: purpose, model, deterministic parameters, prompt
//! hash, and input digest. Replay resolves inference through this key and
//! never re-contacts a provider in determinism mode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identifiers::ModelId;

// ============================================================================
// SECTION: Inference Identity
// ============================================================================

/// Purpose of an LLM inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferencePurpose {
    /// Classification inference.
    #[serde(rename = "CLASSIFY")]
    Classify,
    /// Entity extraction inference.
    #[serde(rename = "EXTRACT")]
    Extract,
    /// Identity-assist candidate proposal.
    #[serde(rename = "IDENTITY_ASSIST")]
    IdentityAssist,
}

/// Deterministic inference parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling bound.
    pub top_p: f64,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

/// Canonical cache key input.
#[derive(Debug, Clone, Serialize)]
struct CacheKeyInput<'a> {
    /// Inference purpose.
    purpose: InferencePurpose,
    /// Model identifier.
    model_id: &'a ModelId,
    /// Deterministic parameters.
    params: &'a InferenceParams,
    /// Prompt digest.
    prompt_sha256: &'a str,
    /// Input digest.
    input_digest_sha256: &'a str,
}

/// Computes the content-addressed cache key for an inference.
///
/// # Errors
///
/// Returns [`HashError`] when canonical serialization fails.
pub fn llm_cache_key(
    purpose: InferencePurpose,
    model_id: &ModelId,
    params: &InferenceParams,
    prompt_sha256: &HashDigest,
    input_digest_sha256: &HashDigest,
) -> Result<HashDigest, HashError> {
    let input = CacheKeyInput {
        purpose,
        model_id,
        params,
        prompt_sha256: prompt_sha256.as_hex(),
        input_digest_sha256: input_digest_sha256.as_hex(),
    };
    HashDigest::of_canonical_json(&input)
}

// ============================================================================
// SECTION: Inference Artifact
// ============================================================================

/// Immutable LLM inference artifact, written once per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmInferenceArtifact {
    /// Inference purpose.
    pub purpose: InferencePurpose,
    /// Model identifier.
    pub model_id: ModelId,
    /// Deterministic parameters the call was made with.
    pub params: InferenceParams,
    /// Prompt digest.
    pub prompt_sha256: HashDigest,
    /// Input digest.
    pub input_digest_sha256: HashDigest,
    /// Parsed strict-JSON model output.
    pub output_json: Value,
    /// Canonical digest of the output JSON.
    pub output_sha256: HashDigest,
}

impl LlmInferenceArtifact {
    /// Builds an artifact from a parsed model output, computing the output
    /// digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn new(
        purpose: InferencePurpose,
        model_id: ModelId,
        params: InferenceParams,
        prompt_sha256: HashDigest,
        input_digest_sha256: HashDigest,
        output_json: Value,
    ) -> Result<Self, HashError> {
        let output_sha256 = HashDigest::of_canonical_json(&output_json)?;
        Ok(Self {
            purpose,
            model_id,
            params,
            prompt_sha256,
            input_digest_sha256,
            output_json,
            output_sha256,
        })
    }

    /// Returns the content-addressed cache key for this artifact.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn cache_key(&self) -> Result<HashDigest, HashError> {
        llm_cache_key(
            self.purpose,
            &self.model_id,
            &self.params,
            &self.prompt_sha256,
            &self.input_digest_sha256,
        )
    }
}
