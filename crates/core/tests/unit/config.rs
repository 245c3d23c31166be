//! Configuration Unit Tests.
//!
//! Verifies JSON parsing with partial documents, file loading, and the
//! setup-time validation that rejects machines the engine cannot run.

use std::io::Write;

use mpsim_core::common::{ConfigError, SimError};
use mpsim_core::config::{Config, ConfidenceKind, FetchPolicyKind, PredictorKind, UpdateStage};
use mpsim_core::sim::program::Program;
use mpsim_core::sim::simulator::Simulator;
use rstest::rstest;

#[test]
fn defaults_validate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.multipath.max_threads, 1);
    assert_eq!(config.confidence.kind, ConfidenceKind::Never);
    assert_eq!(config.predictor.kind, PredictorKind::GShare);
    assert_eq!(config.predictor.update, UpdateStage::Commit);
}

#[test]
fn partial_json_keeps_other_defaults() {
    let config = Config::from_json(
        r#"{
            "multipath": { "max_threads": 8, "fetch_policy": "RoundRobin" },
            "predictor": { "kind": "Gshare", "update": "Writeback" }
        }"#,
    )
    .unwrap();
    assert_eq!(config.multipath.max_threads, 8);
    assert_eq!(config.multipath.fetch_policy, FetchPolicyKind::RoundRobin);
    assert_eq!(config.predictor.kind, PredictorKind::GShare);
    assert_eq!(config.predictor.update, UpdateStage::Writeback);
    assert_eq!(config.core.ruu_size, Config::default().core.ruu_size);
}

#[test]
fn malformed_json_is_rejected() {
    assert!(matches!(
        Config::from_json(r#"{ "core": { "ruu_size": "big" } }"#),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "core": {{ "commit_width": 2 }} }}"#).unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.core.commit_width, 2);

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::from_file(dir.path().join("missing.json")),
        Err(ConfigError::Io { .. })
    ));
}

#[rstest]
#[case::zero_ruu(r#"{"core": {"ruu_size": 0}}"#, "core.ruu_size")]
#[case::zero_issue(r#"{"core": {"issue_width": 0}}"#, "core.issue_width")]
#[case::small_link_pool(r#"{"core": {"link_pool_size": 4}}"#, "core.link_pool_size")]
#[case::no_threads(r#"{"multipath": {"max_threads": 0}}"#, "multipath.max_threads")]
#[case::too_many_threads(r#"{"multipath": {"max_threads": 65}}"#, "multipath.max_threads")]
#[case::too_deep(r#"{"multipath": {"max_spec_levels": 33}}"#, "multipath.max_spec_levels")]
#[case::remove_with_paths(
    r#"{"multipath": {"max_threads": 2, "squash_remove": true}}"#,
    "multipath.squash_remove"
)]
#[case::no_thresholds(
    r#"{"confidence": {"kind": "Resetting", "thresholds": []}}"#,
    "confidence.thresholds"
)]
#[case::thresholds_without_selector(
    r#"{"confidence": {"kind": "Ones", "thresholds": [2, 3]}}"#,
    "confidence.selector"
)]
#[case::odd_line(r#"{"memory": {"line_bytes": 24}}"#, "memory.line_bytes")]
fn invalid_machine_rejected(#[case] json: &str, #[case] field: &str) {
    let config = Config::from_json(json).unwrap();
    match config.validate() {
        Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
        other => panic!("expected {field} to be rejected, got {other:?}"),
    }
}

#[test]
fn simulator_refuses_invalid_config() {
    let mut config = Config::default();
    config.multipath.max_spec_levels = 0;
    let program = Program::from_asm("halt\n").unwrap();
    assert!(matches!(
        Simulator::new(config, &program),
        Err(SimError::Config(ConfigError::Invalid { .. }))
    ));
}
