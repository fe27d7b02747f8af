//! Configuration module for Hoist
//!
//! Handles loading and merging the deployment configuration from multiple
//! sources:
//! - Default values (the stock single-host web deployment)
//! - System configuration (/etc/hoist/hoist.toml)
//! - User configuration (~/.hoist.toml)
//! - Project configuration (./hoist.toml)
//! - Environment variables
//!
//! Later sources win. Each file is a complete `DeployConfig` document;
//! omitted keys fall back to their defaults via `#[serde(default)]`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The SSH public key imported for the EC2 key pair in the stock deployment.
const DEFAULT_PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQDHxJCnp74UyjyW2jwKe1wMQwPrVfL6ywo3jdgPssqYwAiCPLEFlNDPx4A0MitxfjUJc+E//lSz0FfWjFNlP8Qtbjur4Kq0XBUK0I6Vz81Zb3wv9eqh4jesl1kRJQ0isYISqC+poR1jKJV460gJ9RccBU75ZlFNsPOlFDS9jKVTbtQszhP0C8cRS2yMVeDhfsY7Zt3Ub33fYwstw2/5p18PP8ngwHQ6qcPQAUgOb3F61ZA1Yu06fcxTZ/4KwLqdC63keCNf4WgmawPuhMElxNObixTI+Sma8DIH5W7lkDYNUlRG0i6W6n35GSma8SHhCy2VNI0BpF0+TfxofhznlhocToL7yUoRkkXyVdjTt8OJJUzVkz3Ugqm6Xfs6qyeU4sbR3ib0ZSkCW8fvQ1c6hKp/k9Yr0Ci8rt+VyWMBSQTE4RhkKx51DvV+SfZ48tVjba/Vqoe5if1aPLJx8ecFSC4J0fzGE1wnVJG7FfQhukOfJt0hu37yWtdPOlKezWljKa0=";

/// Main deployment configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// AWS client settings
    pub aws: AwsSettings,

    /// Security group settings
    pub security_group: SecurityGroupSettings,

    /// IAM user settings
    pub iam: IamSettings,

    /// S3 bucket settings
    pub bucket: BucketSettings,

    /// EC2 key pair settings
    pub keypair: KeyPairSettings,

    /// EC2 instance settings
    pub instance: InstanceSettings,

    /// Playbook handoff settings
    pub playbook: PlaybookSettings,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            aws: AwsSettings::default(),
            security_group: SecurityGroupSettings::default(),
            iam: IamSettings::default(),
            bucket: BucketSettings::default(),
            keypair: KeyPairSettings::default(),
            instance: InstanceSettings::default(),
            playbook: PlaybookSettings::default(),
        }
    }
}

/// AWS client settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AwsSettings {
    /// Region override (default: resolved from environment/profile)
    pub region: Option<String>,

    /// Named credentials profile
    pub profile: Option<String>,
}

/// A single security group rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// IP protocol: tcp, udp, icmp, -1 (all)
    pub protocol: String,
    /// Start of port range
    pub from_port: i32,
    /// End of port range
    pub to_port: i32,
    /// CIDR block for IPv4
    pub cidr: String,
    /// Rule description
    #[serde(default)]
    pub description: Option<String>,
}

impl SecurityGroupRule {
    /// Ingress rule allowing one TCP port from anywhere.
    fn tcp_from_anywhere(port: i32, description: &str) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr: "0.0.0.0/0".to_string(),
            description: Some(description.to_string()),
        }
    }

    /// Egress rule allowing all traffic.
    fn all_outbound() -> Self {
        Self {
            protocol: "-1".to_string(),
            from_port: 0,
            to_port: 0,
            cidr: "0.0.0.0/0".to_string(),
            description: None,
        }
    }
}

/// Security group settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroupSettings {
    /// Security group name
    pub name: String,

    /// Security group description
    pub description: String,

    /// Ingress rules
    pub ingress: Vec<SecurityGroupRule>,

    /// Egress rules
    pub egress: Vec<SecurityGroupRule>,
}

impl Default for SecurityGroupSettings {
    fn default() -> Self {
        Self {
            name: "web-secgrp".to_string(),
            description: "Enable SSH access".to_string(),
            ingress: vec![
                SecurityGroupRule::tcp_from_anywhere(22, "SSH access from anywhere"),
                SecurityGroupRule::tcp_from_anywhere(80, "HTTP access from anywhere"),
            ],
            egress: vec![SecurityGroupRule::all_outbound()],
        }
    }
}

/// IAM user settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IamSettings {
    /// User name
    pub user_name: String,

    /// Managed policy attached to the user
    pub policy_arn: String,
}

impl Default for IamSettings {
    fn default() -> Self {
        Self {
            user_name: "readonly-user".to_string(),
            policy_arn: "arn:aws:iam::aws:policy/ReadOnlyAccess".to_string(),
        }
    }
}

/// S3 bucket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketSettings {
    /// Bucket name
    pub name: String,

    /// Local file uploaded as the website page
    pub website_file: PathBuf,

    /// Object key for the uploaded page
    pub object_key: String,
}

impl Default for BucketSettings {
    fn default() -> Self {
        Self {
            name: "webpage-bucket".to_string(),
            website_file: PathBuf::from("files/index.html"),
            object_key: "index.html".to_string(),
        }
    }
}

/// EC2 key pair settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPairSettings {
    /// Key pair name
    pub name: String,

    /// SSH public key material to import
    pub public_key: String,
}

impl Default for KeyPairSettings {
    fn default() -> Self {
        Self {
            name: "sshkey".to_string(),
            public_key: DEFAULT_PUBLIC_KEY.to_string(),
        }
    }
}

/// AMI lookup filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmiFilter {
    /// Image name pattern
    pub name_pattern: String,

    /// Owner account id
    pub owner: String,
}

impl Default for AmiFilter {
    fn default() -> Self {
        Self {
            name_pattern: "ubuntu/images/hvm-ssd/ubuntu-focal-20.04-amd64-server-*".to_string(),
            // Canonical
            owner: "099720109477".to_string(),
        }
    }
}

/// EC2 instance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    /// Instance name (used as Name tag)
    pub name: String,

    /// Instance type
    pub instance_type: String,

    /// AMI lookup filter
    pub ami: AmiFilter,

    /// Wait for the instance to reach running state
    pub wait: bool,

    /// Timeout for the running-state wait
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            name: "web-server".to_string(),
            instance_type: "t2.micro".to_string(),
            ami: AmiFilter::default(),
            wait: true,
            wait_timeout: Duration::from_secs(300),
        }
    }
}

/// Playbook handoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookSettings {
    /// Path to the playbook handed to the runner
    pub path: PathBuf,

    /// Remote user the runner connects as
    pub user: String,

    /// Path to the private key matching the imported key pair.
    /// Required before the playbook step can run; tilde-expanded.
    pub private_key_path: Option<String>,

    /// SSH connection retries exported to the runner
    pub ssh_retries: u32,

    /// Whether the runner should verify host keys
    pub host_key_checking: bool,
}

impl Default for PlaybookSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("playbook.yml"),
            user: "ubuntu".to_string(),
            private_key_path: None,
            ssh_retries: 6,
            host_key_checking: false,
        }
    }
}

impl PlaybookSettings {
    /// The private key path with `~` expanded, or an error if unset.
    pub fn expanded_private_key(&self) -> Result<String> {
        let raw = self
            .private_key_path
            .as_deref()
            .ok_or_else(|| Error::MissingConfig("playbook.private_key_path".to_string()))?;
        Ok(shellexpand::tilde(raw).into_owned())
    }
}

impl DeployConfig {
    /// Load configuration, merging all discovered sources.
    ///
    /// A present-but-unparsable file is a hard error: a deployment tool must
    /// not silently provision from defaults. Missing files are skipped.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = DeployConfig::default();

        for path in Self::config_paths(config_path) {
            if path.exists() {
                config = Self::parse_file(&path)?;
            } else if config_path == Some(&path) {
                return Err(Error::FileNotFound(path));
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// The list of configuration file paths to check, in ascending priority.
    fn config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path takes priority over everything else
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = Vec::new();

        // System-wide config
        paths.push(PathBuf::from("/etc/hoist/hoist.toml"));

        // User config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".hoist.toml"));
        }

        // Project config (current directory)
        paths.push(PathBuf::from("hoist.toml"));

        // Environment variable
        if let Ok(env_config) = std::env::var("HOIST_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Parse a single configuration file.
    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::config_parse(path, e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(region) = std::env::var("HOIST_REGION") {
            self.aws.region = Some(region);
        }
        if let Ok(key_path) = std::env::var("HOIST_PRIVATE_KEY_PATH") {
            self.playbook.private_key_path = Some(key_path);
        }
    }

    /// Validate the configuration for a full deployment run.
    pub fn validate(&self) -> Result<()> {
        if self.security_group.name.is_empty() {
            return Err(Error::invalid_config("security_group.name", "must not be empty"));
        }
        if self.bucket.name.is_empty() {
            return Err(Error::invalid_config("bucket.name", "must not be empty"));
        }
        for rule in self.security_group.ingress.iter().chain(&self.security_group.egress) {
            if rule.from_port > rule.to_port {
                return Err(Error::invalid_config(
                    "security_group",
                    format!(
                        "rule port range {}-{} is inverted",
                        rule.from_port, rule.to_port
                    ),
                ));
            }
        }
        // The playbook step cannot run without the matching private key
        self.playbook.expanded_private_key()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_deployment() {
        let config = DeployConfig::default();

        assert_eq!(config.security_group.name, "web-secgrp");
        assert_eq!(config.security_group.ingress.len(), 2);
        assert_eq!(config.security_group.ingress[0].from_port, 22);
        assert_eq!(config.security_group.ingress[1].from_port, 80);
        assert_eq!(config.security_group.egress[0].protocol, "-1");
        assert_eq!(config.iam.policy_arn, "arn:aws:iam::aws:policy/ReadOnlyAccess");
        assert_eq!(config.bucket.name, "webpage-bucket");
        assert_eq!(config.keypair.name, "sshkey");
        assert!(config.keypair.public_key.starts_with("ssh-rsa AAAAB3"));
        assert_eq!(config.instance.instance_type, "t2.micro");
        assert_eq!(config.instance.ami.owner, "099720109477");
        assert_eq!(config.playbook.user, "ubuntu");
        assert_eq!(config.playbook.ssh_retries, 6);
        assert!(!config.playbook.host_key_checking);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: DeployConfig = toml::from_str(
            r#"
            [instance]
            instance_type = "t3.small"

            [playbook]
            private_key_path = "/tmp/key.pem"
            "#,
        )
        .unwrap();

        assert_eq!(config.instance.instance_type, "t3.small");
        // Untouched sections keep their defaults
        assert_eq!(config.instance.name, "web-server");
        assert_eq!(config.security_group.name, "web-secgrp");
        assert_eq!(
            config.playbook.private_key_path.as_deref(),
            Some("/tmp/key.pem")
        );
    }

    #[test]
    fn test_wait_timeout_humantime() {
        let config: DeployConfig = toml::from_str(
            r#"
            [instance]
            wait_timeout = "2m 30s"
            "#,
        )
        .unwrap();

        assert_eq!(config.instance.wait_timeout, Duration::from_secs(150));
    }

    #[test]
    fn test_validate_requires_private_key() {
        let config = DeployConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfig(ref key) if key.contains("private_key_path")));
    }

    #[test]
    fn test_validate_rejects_inverted_port_range() {
        let mut config = DeployConfig::default();
        config.playbook.private_key_path = Some("/tmp/key.pem".to_string());
        config.security_group.ingress[0].from_port = 90;
        config.security_group.ingress[0].to_port = 80;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_tilde_expansion() {
        let settings = PlaybookSettings {
            private_key_path: Some("~/keys/deploy.pem".to_string()),
            ..PlaybookSettings::default()
        };

        let expanded = settings.expanded_private_key().unwrap();
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("keys/deploy.pem"));
    }
}
