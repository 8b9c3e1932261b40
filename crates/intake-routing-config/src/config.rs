// crates/intake-routing-config/src/config.rs
// ============================================================================
// Module: Configuration Loading
// Description: Strict, fail-closed TOML loading for the config snapshot.
// Purpose: Turn operator configuration into a validated, hashed snapshot.
// Dependencies: intake-routing-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits and
//! `deny_unknown_fields` parsing. Missing sections fall back to the built-in
//! defaults; every present value is range-validated by the snapshot itself.
//! Missing or invalid configuration fails closed before any message is
//! processed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use intake_routing_core::ConfigRef;
use intake_routing_core::ConfigSnapshot;
use intake_routing_core::HashError;
use intake_routing_core::PipelineMode;
use intake_routing_core::SnapshotError;
use intake_routing_core::snapshot::ClassifyConfig;
use intake_routing_core::snapshot::ExtractionConfig;
use intake_routing_core::snapshot::IdentityConfig;
use intake_routing_core::snapshot::IncidentGates;
use intake_routing_core::snapshot::IoConfig;
use intake_routing_core::snapshot::LlmConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "intake-routing.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "INTAKE_ROUTING_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: File Model
// ============================================================================

/// TOML file model; absent sections take built-in defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    /// Pipeline section.
    #[serde(default)]
    pipeline: PipelineSection,
    /// Identity section.
    #[serde(default)]
    identity: Option<IdentityConfig>,
    /// Classifier section.
    #[serde(default)]
    classify: Option<ClassifyConfig>,
    /// LLM section.
    #[serde(default)]
    llm: Option<LlmConfig>,
    /// Incident gate section.
    #[serde(default)]
    incident: Option<IncidentGates>,
    /// Extraction section.
    #[serde(default)]
    extraction: Option<ExtractionConfig>,
    /// External I/O section.
    #[serde(default)]
    io: Option<IoConfig>,
}

/// Pipeline mode section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineSection {
    /// Classifier operating mode.
    #[serde(default = "default_mode")]
    mode: PipelineMode,
    /// Determinism mode flag.
    #[serde(default)]
    determinism_mode: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            determinism_mode: false,
        }
    }
}

/// Default pipeline mode.
const fn default_mode() -> PipelineMode {
    PipelineMode::Baseline
}

impl ConfigFile {
    /// Merges the file onto the built-in defaults.
    fn into_snapshot(self) -> ConfigSnapshot {
        let defaults = ConfigSnapshot::default();
        ConfigSnapshot {
            mode: self.pipeline.mode,
            determinism_mode: self.pipeline.determinism_mode,
            identity: self.identity.unwrap_or(defaults.identity),
            classify: self.classify.unwrap_or(defaults.classify),
            llm: self.llm.unwrap_or(defaults.llm),
            incident: self.incident.unwrap_or(defaults.incident),
            extraction: self.extraction.unwrap_or(defaults.extraction),
            io: self.io.unwrap_or(defaults.io),
        }
    }
}

// ============================================================================
// SECTION: Loaded Configuration
// ============================================================================

/// Validated snapshot plus the reference binding decisions to it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Immutable configuration snapshot.
    pub snapshot: ConfigSnapshot,
    /// Canonical reference for decision hashing.
    pub config_ref: ConfigRef,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config read failed for {path}: {reason}")]
    Io {
        /// Attempted path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// Config file exceeds the size limit.
    #[error("config file {path} exceeds {limit} bytes")]
    TooLarge {
        /// Attempted path.
        path: String,
        /// Size limit in bytes.
        limit: usize,
    },
    /// TOML parsing failed.
    #[error("config parse failed: {0}")]
    Parse(String),
    /// Snapshot validation failed.
    #[error(transparent)]
    Invalid(#[from] SnapshotError),
    /// Canonical hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Resolves the config path from an explicit argument or the environment.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(
        || {
            env::var(CONFIG_ENV_VAR)
                .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from)
        },
        Path::to_path_buf,
    )
}

/// Loads and validates the configuration snapshot from a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError`] when reading, parsing, or validation fails.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = resolve_path(path);
    let display = path.display().to_string();
    let metadata = fs::metadata(&path).map_err(|err| ConfigError::Io {
        path: display.clone(),
        reason: err.to_string(),
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE as u64 {
        return Err(ConfigError::TooLarge {
            path: display,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }
    let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Io {
        path: display.clone(),
        reason: err.to_string(),
    })?;
    load_config_from_str(&contents, &display)
}

/// Loads and validates the configuration snapshot from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError`] when parsing or validation fails.
pub fn load_config_from_str(contents: &str, path: &str) -> Result<LoadedConfig, ConfigError> {
    let file: ConfigFile =
        toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let snapshot = file.into_snapshot();
    snapshot.validate()?;
    let config_ref = ConfigRef {
        path: path.to_string(),
        sha256: snapshot.canonical_hash()?,
    };
    Ok(LoadedConfig {
        snapshot,
        config_ref,
    })
}
