//! Hoist - provision a single-host AWS web deployment
//!
//! Stands up a security group, a read-only IAM user, an S3 bucket, an EC2
//! instance, and an Elastic IP, then hands in-instance setup to
//! ansible-playbook.
//!
//! This is the main entry point for the Hoist CLI.

mod cli;

use clap::Parser;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use hoist::config::DeployConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("Hoist v{} by {}", VERSION, AUTHORS);
    }

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            hoist::output::failed("hoist", &err.to_string());
            err.exit_code()
        }
    };

    std::process::exit(exit_code);
}

/// Load configuration and dispatch the subcommand.
async fn run(cli: &Cli) -> hoist::Result<i32> {
    // A present-but-broken config file is fatal; missing files fall back
    // to the stock deployment defaults.
    let config = DeployConfig::load(cli.config.as_ref())?;

    let ctx = CommandContext::new(cli, config);

    match &cli.command {
        Commands::Up(args) => args.execute(&ctx, false).await,
        Commands::Preview(args) => args.execute(&ctx, true).await,
        Commands::Destroy(args) => args.execute(&ctx).await,
        Commands::Outputs(args) => args.execute(&ctx).await,
        Commands::Validate(args) => args.execute(&ctx).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
