//! The `destroy` subcommand.

use super::CommandContext;
use clap::Parser;
use hoist::error::{Error, Result};
use hoist::stack::Stack;
use std::io::Write;

/// Arguments for the destroy command
#[derive(Parser, Debug, Clone)]
pub struct DestroyArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl DestroyArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        if !ctx.check_mode && !self.yes && !confirm(&ctx.config.instance.name)? {
            return Err(Error::Aborted);
        }

        let stack = Stack::connect(ctx.config.clone()).await;
        if ctx.check_mode {
            stack.preview_destroy().await?;
        } else {
            stack.destroy().await?;
        }

        Ok(0)
    }
}

/// Ask the user to confirm the teardown.
fn confirm(name: &str) -> Result<bool> {
    print!("Destroy deployment '{}' and all its resources? [y/N] ", name);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
