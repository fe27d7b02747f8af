//! The `outputs` subcommand.

use super::CommandContext;
use crate::cli::OutputFormat;
use clap::Parser;
use hoist::error::Result;
use hoist::outputs::StackOutputs;
use std::path::Path;

/// Arguments for the outputs command
#[derive(Parser, Debug, Clone)]
pub struct OutputsArgs {
    /// Print the secret access key in full
    #[arg(long)]
    pub show_secrets: bool,
}

impl OutputsArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let outputs = StackOutputs::load(Path::new("."))?;

        match ctx.format {
            OutputFormat::Human => outputs.print_human(self.show_secrets),
            OutputFormat::Json => println!("{}", outputs.to_json()?),
        }

        Ok(0)
    }
}
