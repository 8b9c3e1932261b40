// crates/intake-routing-core/src/runtime/telemetry.rs
// ============================================================================
// Module: Pipeline Telemetry
// Description: Observability hooks for stage outcomes and cache behavior.
// Purpose: Provide metric events without hard exporter dependencies.
// Dependencies: crate::core::registry
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for stage counters and cache
//! hit ratios. It is intentionally dependency-light so deployments can plug
//! in Prometheus or OpenTelemetry without redesign. Labels must never carry
//! raw evidence or message content.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::registry::Stage;

// ============================================================================
// SECTION: Metrics Interface
// ============================================================================

/// Stage outcome classification for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage completed normally.
    Done,
    /// Stage failed closed.
    FailedClosed,
    /// Stage output was reused under an existing job key.
    Reused,
}

/// Metrics sink for the pipeline.
pub trait PipelineMetrics {
    /// Records a stage outcome.
    fn stage_outcome(&self, stage: Stage, outcome: StageOutcome);

    /// Records an inference cache lookup result.
    fn cache_lookup(&self, hit: bool);
}

/// Metrics sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl PipelineMetrics for NoopMetrics {
    fn stage_outcome(&self, _stage: Stage, _outcome: StageOutcome) {}

    fn cache_lookup(&self, _hit: bool) {}
}

/// Shared metrics sink backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedMetrics {
    /// Inner metrics implementation.
    inner: Arc<dyn PipelineMetrics + Send + Sync>,
}

impl SharedMetrics {
    /// Wraps a metrics sink in a shared, clonable wrapper.
    #[must_use]
    pub fn from_metrics(metrics: impl PipelineMetrics + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(metrics),
        }
    }

    /// Returns a sink that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::from_metrics(NoopMetrics)
    }
}

impl PipelineMetrics for SharedMetrics {
    fn stage_outcome(&self, stage: Stage, outcome: StageOutcome) {
        self.inner.stage_outcome(stage, outcome);
    }

    fn cache_lookup(&self, hit: bool) {
        self.inner.cache_lookup(hit);
    }
}
