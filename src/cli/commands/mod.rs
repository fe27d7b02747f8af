//! Subcommands module for the Hoist CLI
//!
//! This module contains all the subcommand implementations.

pub mod destroy;
pub mod outputs;
pub mod up;
pub mod validate;

use crate::cli::OutputFormat;
use hoist::config::DeployConfig;

/// Common context shared between commands
pub struct CommandContext {
    /// Deployment configuration
    pub config: DeployConfig,
    /// Check mode (dry-run)
    pub check_mode: bool,
    /// Output format
    pub format: OutputFormat,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: DeployConfig) -> Self {
        Self {
            config,
            check_mode: cli.check_mode,
            format: cli.output,
        }
    }
}
