//! Error types for Hoist.
//!
//! This module defines the error types used throughout Hoist, providing
//! rich error information for debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Hoist operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Hoist.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Error parsing a deployment configuration file.
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParse {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// A required configuration value is missing.
    #[error("Missing required configuration value: '{0}'")]
    MissingConfig(String),

    // ========================================================================
    // Provisioning Errors
    // ========================================================================
    /// An AWS call made on behalf of a resource failed. The SDK error is
    /// preserved as the source and its display is surfaced unmodified.
    #[error("Failed to {operation} for '{resource}': {message}")]
    Provision {
        /// Resource name (security group, bucket, instance, ...)
        resource: String,
        /// The operation that failed (create, describe, delete, ...)
        operation: String,
        /// Error message from the AWS SDK
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No AMI matched the configured image filter.
    #[error("No AMI found matching '{0}'")]
    AmiNotFound(String),

    /// Timed out polling a resource for a state transition.
    #[error("Timed out waiting for '{resource}' to reach {state} after {timeout_secs} seconds")]
    WaitTimeout {
        /// Resource name
        resource: String,
        /// Desired state
        state: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    // ========================================================================
    // Playbook Errors
    // ========================================================================
    /// The playbook runner binary could not be located on PATH.
    #[error("Playbook runner '{0}' not found on PATH")]
    RunnerNotFound(String),

    /// The playbook run exited with a non-zero status.
    #[error("Playbook '{playbook}' failed with exit code {exit_code}")]
    PlaybookFailed {
        /// Path to the playbook
        playbook: PathBuf,
        /// Exit code reported by the runner
        exit_code: i32,
    },

    /// Error parsing a playbook file.
    #[error("Failed to parse playbook '{path}': {message}")]
    PlaybookParse {
        /// Path to the playbook file
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Outputs Errors
    // ========================================================================
    /// No persisted outputs exist yet.
    #[error("No outputs found at '{0}' (run 'hoist up' first)")]
    OutputsNotFound(PathBuf),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Run aborted by the user.
    #[error("Aborted by user")]
    Aborted,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new provisioning error wrapping an AWS SDK failure.
    pub fn provision<E>(
        resource: impl Into<String>,
        operation: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Provision {
            resource: resource.into(),
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new invalid-config error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new config parse error.
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Provision { .. } | Error::AmiNotFound(_) | Error::WaitTimeout { .. } => 2,
            Error::RunnerNotFound(_)
            | Error::PlaybookFailed { .. }
            | Error::PlaybookParse { .. } => 3,
            Error::ConfigParse { .. }
            | Error::InvalidConfig { .. }
            | Error::MissingConfig(_)
            | Error::TomlParse(_) => 4,
            Error::OutputsNotFound(_) => 5,
            Error::Aborted => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "throttled");
        let err = Error::provision("web-secgrp", "create security group", io);

        assert!(err.to_string().contains("web-secgrp"));
        assert!(err.to_string().contains("throttled"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::AmiNotFound("ubuntu".into()).exit_code(), 2);
        assert_eq!(
            Error::PlaybookFailed {
                playbook: PathBuf::from("playbook.yml"),
                exit_code: 4,
            }
            .exit_code(),
            3
        );
        assert_eq!(Error::MissingConfig("private_key_path".into()).exit_code(), 4);
        assert_eq!(Error::Aborted.exit_code(), 130);
    }
}
