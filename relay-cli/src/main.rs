mod cli;
mod commands;
mod logging;

use crate::cli::{Args, Commands};
use anyhow::Result;
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _guard = match logging::init_logging(args.verbose, args.quiet, args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command.unwrap_or_default() {
        Commands::Run {
            config,
            url,
            strategy,
            dry_run,
        } => {
            let config = commands::load_config(&config, url, strategy)?;
            if dry_run {
                return commands::dry_run(config).await;
            }

            let token = CancellationToken::new();
            spawn_ctrl_c(token.clone());
            let outcome = commands::relay(config, token).await?;
            info!("{}", commands::describe(outcome));
        }
        Commands::Variants {
            url,
            resolutions,
            json,
            timeout,
        } => commands::variants(&url, &resolutions, json, timeout).await?,
        Commands::InitConfig { path, force } => commands::init_config(&path, force)?,
    }
    Ok(())
}

fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping relay");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });
}
