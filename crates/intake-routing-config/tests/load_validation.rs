// crates/intake-routing-config/tests/load_validation.rs
// ============================================================================
// Module: Config Loading Tests
// Description: Verifies strict, fail-closed configuration loading.
// ============================================================================
//! ## Overview
//! The example must load, absent sections must default, and malformed or
//! out-of-range configuration must be rejected before any message is
//! processed.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::io::Write;

use intake_routing_config::ConfigError;
use intake_routing_config::config_toml_example;
use intake_routing_config::load_config;
use intake_routing_config::load_config_from_str;
use intake_routing_core::PipelineMode;

#[test]
fn example_config_loads_and_validates() {
    let loaded =
        load_config_from_str(&config_toml_example(), "example.toml").expect("example loads");
    assert_eq!(loaded.snapshot.mode, PipelineMode::LlmFirst);
    assert!(!loaded.snapshot.determinism_mode);
    assert_eq!(loaded.config_ref.path, "example.toml");
    assert_eq!(loaded.config_ref.sha256.as_hex().len(), 64);
}

#[test]
fn empty_config_takes_the_builtin_defaults() {
    let loaded = load_config_from_str("", "empty.toml").expect("empty loads");
    assert_eq!(loaded.snapshot.mode, PipelineMode::Baseline);
    assert_eq!(loaded.snapshot.classify.max_llm_attempts, 2);
    assert_eq!(loaded.snapshot.io.directory_timeout_ms, 2_000);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = load_config_from_str("[pipeline]\nmode = \"BASELINE\"\nsurprise = 1\n", "bad.toml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn non_canonical_mode_is_rejected() {
    let err =
        load_config_from_str("[pipeline]\nmode = \"FREESTYLE\"\n", "bad.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn out_of_range_threshold_is_rejected() {
    let contents = r#"
[classify]
min_primary_intent = 1.5
min_product_line = 0.65
min_urgency = 0.6
min_risk_flag = 0.8
disagreement_rule_confidence = 0.85
max_llm_attempts = 2
rules_version = "rules-v1"
vip_senders = []
"#;
    let err = load_config_from_str(contents, "bad.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn zero_llm_attempts_are_rejected() {
    let contents = r#"
[classify]
min_primary_intent = 0.72
min_product_line = 0.65
min_urgency = 0.6
min_risk_flag = 0.8
disagreement_rule_confidence = 0.85
max_llm_attempts = 0
rules_version = "rules-v1"
vip_senders = []
"#;
    let err = load_config_from_str(contents, "bad.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn identical_content_hashes_identically_across_paths() {
    let first = load_config_from_str(&config_toml_example(), "a.toml").expect("first");
    let second = load_config_from_str(&config_toml_example(), "b.toml").expect("second");
    assert_eq!(first.config_ref.sha256, second.config_ref.sha256);
    assert_ne!(first.config_ref.path, second.config_ref.path);
}

#[test]
fn file_loading_reads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(config_toml_example().as_bytes()).expect("write");
    let loaded = load_config(Some(file.path())).expect("file loads");
    assert_eq!(loaded.snapshot.mode, PipelineMode::LlmFirst);
}

#[test]
fn missing_file_fails_closed() {
    let err = load_config(Some(std::path::Path::new("/nonexistent/intake.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn oversized_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    let filler = format!("# {}\n", "x".repeat(2 * 1024 * 1024));
    file.write_all(filler.as_bytes()).expect("write");
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::TooLarge { .. }));
}
