//! The `up` and `preview` subcommands.

use super::CommandContext;
use crate::cli::OutputFormat;
use clap::Parser;
use hoist::error::Result;
use hoist::playbook;
use hoist::stack::{Stack, UpOptions};
use std::path::Path;

/// Arguments for the up/preview commands
#[derive(Parser, Debug, Clone)]
pub struct UpArgs {
    /// Stop after the Elastic IP; do not run the playbook
    #[arg(long)]
    pub skip_playbook: bool,
}

impl UpArgs {
    /// Provision the stack. `force_check` is set by the `preview` alias.
    pub async fn execute(&self, ctx: &CommandContext, force_check: bool) -> Result<i32> {
        let check_mode = force_check || ctx.check_mode;

        if !check_mode {
            ctx.config.validate()?;
            if !self.skip_playbook {
                playbook::validate_playbook(&ctx.config.playbook.path)?;
            }
        }

        let stack = Stack::connect(ctx.config.clone()).await;
        let outputs = stack
            .up(UpOptions {
                check_mode,
                skip_playbook: self.skip_playbook,
            })
            .await?;

        if let Some(outputs) = outputs {
            let path = outputs.save(Path::new("."))?;
            tracing::debug!(path = %path.display(), "persisted outputs");

            match ctx.format {
                OutputFormat::Human => outputs.print_human(false),
                OutputFormat::Json => println!("{}", outputs.to_json()?),
            }
        }

        Ok(0)
    }
}
