// crates/intake-routing-core/src/runtime/mod.rs
// ============================================================================
// Module: Pipeline Runtime
// Description: Stage implementations, orchestrator, caches, and stores.
// Purpose: Execute the deterministic decision pipeline over the core model.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime holds the executable side of the decision core: the six
//! stage implementations, the orchestrator enforcing the job contract, the
//! inference cache, in-memory store backends, bounded retry, and the
//! correction sink.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod attachments;
pub mod cache;
pub mod classify;
pub mod correction;
pub mod extract;
pub mod identity;
pub mod normalize;
pub mod orchestrator;
pub mod retry;
pub mod route;
pub mod store;
pub mod telemetry;
pub mod validators;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CacheError;
pub use cache::InMemoryInferenceCache;
pub use cache::InferenceCache;
pub use cache::SharedInferenceCache;
pub use classify::ClassifyInputs;
pub use classify::claim_related_hint;
pub use classify::prescan_risks;
pub use correction::CorrectionError;
pub use correction::submit_correction;
pub use extract::ExtractInputs;
pub use extract::redact_value;
pub use identity::IdentityInputs;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorError;
pub use orchestrator::ReplayComparison;
pub use orchestrator::ReplayReport;
pub use orchestrator::RunOutcome;
pub use retry::Backoff;
pub use retry::NoopBackoff;
pub use retry::RetryPolicy;
pub use retry::SleepBackoff;
pub use retry::with_retry;
pub use route::RouteInputs;
pub use store::InMemoryArtifactStore;
pub use store::InMemoryAttachmentStore;
pub use store::InMemoryAuditStore;
pub use store::InMemoryBroker;
pub use store::SharedArtifactStore;
pub use store::SharedAttachmentStore;
pub use store::SharedAuditStore;
pub use store::artifact_uri;
pub use telemetry::NoopMetrics;
pub use telemetry::PipelineMetrics;
pub use telemetry::SharedMetrics;
pub use telemetry::StageOutcome;
