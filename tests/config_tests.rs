//! Unit tests for deployment configuration loading
//!
//! Tests cover:
//! - Stock defaults
//! - Explicit config paths
//! - Partial files keeping defaults
//! - Validation failures

use hoist::config::DeployConfig;
use hoist::error::Error;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_explicit_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [aws]
        region = "eu-west-1"

        [bucket]
        name = "my-site-bucket"

        [playbook]
        private_key_path = "/tmp/deploy.pem"
        "#
    )
    .unwrap();

    let config = DeployConfig::load(Some(&file.path().to_path_buf())).unwrap();

    assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.bucket.name, "my-site-bucket");
    // Unset sections keep the stock deployment values
    assert_eq!(config.security_group.name, "web-secgrp");
    assert_eq!(config.instance.instance_type, "t2.micro");
}

#[test]
fn test_load_missing_explicit_file_fails() {
    let path = std::path::PathBuf::from("/nonexistent/hoist.toml");
    let err = DeployConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[test]
fn test_load_broken_file_is_hard_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "this is not toml [").unwrap();

    let err = DeployConfig::load(Some(&file.path().to_path_buf())).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
    assert_eq!(err.exit_code(), 4);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_validate_passes_with_private_key() {
    let mut config = DeployConfig::default();
    config.playbook.private_key_path = Some("/tmp/deploy.pem".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_empty_bucket_name() {
    let mut config = DeployConfig::default();
    config.playbook.private_key_path = Some("/tmp/deploy.pem".to_string());
    config.bucket.name = String::new();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "bucket.name"));
}

#[test]
fn test_default_ingress_covers_ssh_and_http() {
    let config = DeployConfig::default();
    let ports: Vec<i32> = config
        .security_group
        .ingress
        .iter()
        .map(|r| r.from_port)
        .collect();

    assert_eq!(ports, vec![22, 80]);
    assert!(config
        .security_group
        .ingress
        .iter()
        .all(|r| r.cidr == "0.0.0.0/0" && r.protocol == "tcp"));
}
