//! The `validate` subcommand.

use super::CommandContext;
use clap::Parser;
use colored::Colorize;
use hoist::error::Result;
use hoist::playbook;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Check the deployment config and the playbook without touching AWS.
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        ctx.config.validate()?;
        println!("{}: deployment configuration", "ok".green());

        playbook::validate_playbook(&ctx.config.playbook.path)?;
        println!(
            "{}: playbook {}",
            "ok".green(),
            ctx.config.playbook.path.display()
        );

        Ok(0)
    }
}
