//! checkoutfs binary
//!
//! Runs the file server, the standalone lock service, or the interactive
//! checkout shell.

use checkoutfs::cli::{Cli, Commands, RunContext};
use checkoutfs::config::ConfigLoader;
use checkoutfs::logging::{init_logging, LoggingConfig};
use clap::Parser;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let context = match RunContext::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", checkoutfs::cli::map_error(&e));
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    info!("checkoutfs starting");
    if let Err(e) = runtime.block_on(context.execute(&cli.command)) {
        error!("Command failed: {}", e);
        eprintln!("{}", checkoutfs::cli::map_error(&e));
        process::exit(1);
    }
}

/// Build logging configuration from the config file, then CLI flags.
///
/// The shell shares the terminal with the user, so it stays quiet unless
/// `--verbose` is given.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    if matches!(cli.command, Commands::Shell { .. }) && !cli.verbose {
        let mut config = LoggingConfig::default();
        config.level = "off".to_string();
        return config;
    }

    let mut config = ConfigLoader::load(cli.config.as_deref())
        .ok()
        .map(|c| c.logging)
        .unwrap_or_default();

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    config
}
