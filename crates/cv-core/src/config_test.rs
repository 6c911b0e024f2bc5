use super::*;

#[test]
fn test_parse_minimal_config() {
    let config = GateConfig::from_yaml_str("address: 10.0.0.1:7443").unwrap();
    assert_eq!(config.address, "10.0.0.1:7443");
    assert_eq!(config.ready_timeout(), Duration::from_secs(30));
    assert_eq!(config.peer_wait_timeout(), Duration::from_secs(60));
    assert_eq!(config.update_jitter_max(), Duration::from_secs(30));
    assert_eq!(config.schema_update_env, "SCHEMA_UPDATE");
    assert_eq!(config.retry, RetryConfig::default());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
address: "node-2.internal:7443"
ready_timeout_ms: 5000
peer_wait_timeout_ms: 1000
update_jitter_max_ms: 0
schema_update_env: MY_UPDATE
retry:
  max_attempts: 3
  base_delay_ms: 10
  max_delay_ms: 100
"#;
    let config = GateConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.ready_timeout(), Duration::from_secs(5));
    assert_eq!(config.peer_wait_timeout(), Duration::from_secs(1));
    assert_eq!(config.update_jitter_max(), Duration::ZERO);
    assert_eq!(config.schema_update_env, "MY_UPDATE");
    assert_eq!(config.retry.max_attempts, 3);
}

#[test]
fn test_unknown_field_rejected() {
    let err = GateConfig::from_yaml_str("address: a:1\nbogus: true").unwrap_err();
    assert!(matches!(err, CoreError::ConfigParseError { .. }));
}

#[test]
fn test_missing_address_rejected() {
    assert!(GateConfig::from_yaml_str("ready_timeout_ms: 10").is_err());
}

#[test]
fn test_empty_address_invalid() {
    let err = GateConfig::from_yaml_str("address: ''").unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
}

#[test]
fn test_zero_ready_timeout_invalid() {
    let err = GateConfig::from_yaml_str("address: a:1\nready_timeout_ms: 0").unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
}

#[test]
fn test_retry_bounds_invalid() {
    let yaml = "address: a:1\nretry:\n  base_delay_ms: 500\n  max_delay_ms: 100";
    let err = GateConfig::from_yaml_str(yaml).unwrap_err();
    assert!(err.to_string().contains("base_delay_ms"));

    let yaml = "address: a:1\nretry:\n  max_attempts: 0";
    assert!(GateConfig::from_yaml_str(yaml).is_err());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gate.yml");
    std::fs::write(&path, "address: 127.0.0.1:9000\n").unwrap();

    let config = GateConfig::load(&path).unwrap();
    assert_eq!(config.address, "127.0.0.1:9000");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = GateConfig::load(&dir.path().join("nope.yml")).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
fn test_new_uses_defaults() {
    let config = GateConfig::new("127.0.0.1:1");
    config.validate().unwrap();
    assert_eq!(config.ready_timeout_ms, 30_000);
}
