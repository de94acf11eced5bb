//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use webca_service::ServiceConfig;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Missing file means defaults
    let mut config = ServiceConfig::load(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let ctx = commands::Context { config };

    match cli.command {
        Commands::Init(args) => commands::init::execute(ctx, args).await,
        Commands::Serve => commands::serve::execute(ctx).await,
        Commands::Crl(args) => commands::crl::execute(ctx, args).await,
        Commands::OcspQuery(args) => commands::ocsp_query::execute(ctx, args).await,
    }
}

/// `RUST_LOG` wins; otherwise info, or debug with `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
