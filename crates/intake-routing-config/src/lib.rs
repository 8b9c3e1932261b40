// crates/intake-routing-config/src/lib.rs
// ============================================================================
// Module: Intake Routing Config Library
// Description: Canonical config and ruleset loading with fail-closed validation.
// Purpose: Single source of truth for intake-routing.toml semantics.
// Dependencies: intake-routing-core, serde, toml
// ============================================================================

//! ## Overview
//! `intake-routing-config` loads the configuration snapshot and the routing
//! ruleset from TOML with strict size limits and fail-closed validation.
//! Loading produces immutable values plus the canonical references
//! (`ConfigRef`, `RulesetRef`) that bind every decision hash to the exact
//! configuration state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;
pub mod ruleset;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::LoadedConfig;
pub use config::load_config;
pub use config::load_config_from_str;
pub use examples::config_toml_example;
pub use examples::ruleset_toml_example;
pub use ruleset::LoadedRuleset;
pub use ruleset::RulesetLoadError;
pub use ruleset::default_ruleset;
pub use ruleset::load_ruleset;
pub use ruleset::load_ruleset_from_str;
