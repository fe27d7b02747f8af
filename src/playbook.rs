//! Playbook handoff.
//!
//! Once the host has a public address, in-instance setup belongs to the
//! external playbook runner (`ansible-playbook`). This module renders the
//! invocation (remote user, single-host inline inventory, private key, and
//! the bucket name as an extra variable) and runs it, surfacing a non-zero
//! exit as an error. Nothing of the runner's job is reimplemented here.

use crate::config::PlaybookSettings;
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::path::PathBuf;
use tokio::process::Command;

/// The external playbook runner binary.
const RUNNER_BIN: &str = "ansible-playbook";

/// A rendered playbook invocation for one host.
#[derive(Debug, Clone)]
pub struct PlaybookRunner {
    playbook: PathBuf,
    user: String,
    private_key: String,
    ssh_retries: u32,
    host_key_checking: bool,
    bucket: String,
}

impl PlaybookRunner {
    /// Build a runner from the playbook settings. Fails when the private key
    /// path is not configured.
    pub fn new(settings: &PlaybookSettings, bucket: &str) -> Result<Self> {
        Ok(Self {
            playbook: settings.path.clone(),
            user: settings.user.clone(),
            private_key: settings.expanded_private_key()?,
            ssh_retries: settings.ssh_retries,
            host_key_checking: settings.host_key_checking,
            bucket: bucket.to_string(),
        })
    }

    /// Environment passed to the runner.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = Vec::new();
        if !self.host_key_checking {
            vars.push(("ANSIBLE_HOST_KEY_CHECKING".to_string(), "False".to_string()));
        }
        vars.push((
            "ANSIBLE_SSH_RETRIES".to_string(),
            self.ssh_retries.to_string(),
        ));
        vars
    }

    /// Argument vector for the runner. The inventory is the single host,
    /// given inline with a trailing comma.
    pub fn argv(&self, public_ip: &str) -> Vec<String> {
        vec![
            RUNNER_BIN.to_string(),
            "-u".to_string(),
            self.user.clone(),
            "-i".to_string(),
            format!("{},", public_ip),
            "--private-key".to_string(),
            self.private_key.clone(),
            "-e".to_string(),
            format!("s3_bucket={}", self.bucket),
            self.playbook.display().to_string(),
        ]
    }

    /// The full invocation as one displayable command line.
    pub fn rendered(&self, public_ip: &str) -> String {
        let env = self
            .env_vars()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", env, shell_words::join(self.argv(public_ip)))
    }

    /// Run the playbook against the host, inheriting stdio so the runner's
    /// own progress output reaches the terminal.
    pub async fn run(&self, public_ip: &str) -> Result<()> {
        let binary = which::which(RUNNER_BIN)
            .map_err(|_| Error::RunnerNotFound(RUNNER_BIN.to_string()))?;

        let argv = self.argv(public_ip);
        tracing::info!(command = %self.rendered(public_ip), "running playbook");

        let status = Command::new(binary)
            .args(&argv[1..])
            .envs(self.env_vars())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::PlaybookFailed {
                playbook: self.playbook.clone(),
                exit_code: status.code().unwrap_or(-1),
            })
        }
    }
}

/// Sanity-check a playbook file without running it: it must parse as YAML
/// and be a sequence of plays, each naming its hosts.
pub fn validate_playbook(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content)?;

    let plays = value.as_sequence().ok_or_else(|| Error::PlaybookParse {
        path: path.to_path_buf(),
        message: "playbook must be a list of plays".to_string(),
    })?;

    for (i, play) in plays.iter().enumerate() {
        if play.get("hosts").is_none() {
            return Err(Error::PlaybookParse {
                path: path.to_path_buf(),
                message: format!("play {} is missing the required 'hosts' field", i + 1),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybookSettings;

    fn runner() -> PlaybookRunner {
        let settings = PlaybookSettings {
            private_key_path: Some("/home/deploy/.ssh/sshkey.pem".to_string()),
            ..PlaybookSettings::default()
        };
        PlaybookRunner::new(&settings, "webpage-bucket").unwrap()
    }

    #[test]
    fn test_argv_interpolates_host_key_and_bucket() {
        let argv = runner().argv("203.0.113.10");

        assert_eq!(
            argv,
            vec![
                "ansible-playbook",
                "-u",
                "ubuntu",
                "-i",
                "203.0.113.10,",
                "--private-key",
                "/home/deploy/.ssh/sshkey.pem",
                "-e",
                "s3_bucket=webpage-bucket",
                "playbook.yml",
            ]
        );
    }

    #[test]
    fn test_env_vars_disable_host_key_checking() {
        let vars = runner().env_vars();

        assert!(vars.contains(&("ANSIBLE_HOST_KEY_CHECKING".to_string(), "False".to_string())));
        assert!(vars.contains(&("ANSIBLE_SSH_RETRIES".to_string(), "6".to_string())));
    }

    #[test]
    fn test_env_vars_respect_host_key_checking() {
        let settings = PlaybookSettings {
            private_key_path: Some("/tmp/key.pem".to_string()),
            host_key_checking: true,
            ..PlaybookSettings::default()
        };
        let runner = PlaybookRunner::new(&settings, "b").unwrap();

        assert!(!runner
            .env_vars()
            .iter()
            .any(|(k, _)| k == "ANSIBLE_HOST_KEY_CHECKING"));
    }

    #[test]
    fn test_rendered_command_line() {
        let rendered = runner().rendered("203.0.113.10");

        assert!(rendered.starts_with("ANSIBLE_HOST_KEY_CHECKING=False ANSIBLE_SSH_RETRIES=6"));
        assert!(rendered.contains("ansible-playbook"));
        assert!(rendered.contains("203.0.113.10,"));
        assert!(rendered.contains("s3_bucket=webpage-bucket"));
        assert!(rendered.contains("playbook.yml"));
    }

    #[test]
    fn test_missing_private_key_is_config_error() {
        let err = PlaybookRunner::new(&PlaybookSettings::default(), "b").unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
    }

    #[test]
    fn test_validate_playbook_accepts_plays() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            "- hosts: all\n  tasks:\n    - name: ping\n      ping:\n",
        )
        .unwrap();

        assert!(validate_playbook(temp.path()).is_ok());
    }

    #[test]
    fn test_validate_playbook_rejects_missing_hosts() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "- tasks: []\n").unwrap();

        let err = validate_playbook(temp.path()).unwrap_err();
        assert!(matches!(err, Error::PlaybookParse { .. }));
    }

    #[test]
    fn test_validate_playbook_rejects_non_sequence() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "hosts: all\n").unwrap();

        let err = validate_playbook(temp.path()).unwrap_err();
        assert!(matches!(err, Error::PlaybookParse { .. }));
    }
}
