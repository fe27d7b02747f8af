//! CLI module for Hoist
//!
//! This module provides the command-line interface for Hoist, including
//! argument parsing, configuration loading, and subcommand handling.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Hoist - provision a single-host AWS web deployment
///
/// Provisions a security group, IAM user, S3 bucket, EC2 instance, and
/// Elastic IP, then hands in-instance setup to ansible-playbook.
#[derive(Parser, Debug, Clone)]
#[command(name = "hoist")]
#[command(author = "Hoist Contributors")]
#[command(version)]
#[command(about = "Provision a single-host AWS web deployment", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to deployment configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv, -vvvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run in check mode (dry-run, don't make changes)
    #[arg(long = "check", global = true)]
    pub check_mode: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    Human,
    /// JSON output for scripting
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Human
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Provision the stack and run the playbook
    Up(commands::up::UpArgs),

    /// Show what `up` would change without touching anything
    Preview(commands::up::UpArgs),

    /// Tear the stack down in reverse order
    Destroy(commands::destroy::DestroyArgs),

    /// Print the outputs persisted by the last run
    Outputs(commands::outputs::OutputsArgs),

    /// Validate the deployment config and the playbook
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-4)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_is_capped() {
        let cli = Cli::parse_from(["hoist", "-vvvvvvv", "outputs"]);
        assert_eq!(cli.verbosity(), 4);
    }

    #[test]
    fn test_check_flag_is_global() {
        let cli = Cli::parse_from(["hoist", "up", "--check"]);
        assert!(cli.check_mode);
    }
}
