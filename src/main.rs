// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the trigger-aligned scope and spectrum analyzer daemon

use anyhow::Result;
use clap::Parser;
use log::info;

use std::path::PathBuf;
use tokio::signal;

use rust_rtscope::config::{self, Config};
use rust_rtscope::daemon::Daemon;

/// Trigger-aligned capture and spectrum analysis on a simulated process image
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Host tick rate in Hz
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Ticks before the simulated bus becomes operational
    #[arg(long)]
    startup_cycles: Option<u64>,

    /// Enable every scope and analyzer at start
    #[arg(long)]
    enable_all: bool,

    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    cycles: Option<u64>,

    /// Write the final parameter values (JSON) to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with appropriate level based on verbose and quiet flags
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    // Check if --show-config-schema flag is set
    if args.show_config_schema {
        return config::output_config_schema();
    }

    // Validate configuration file if --validate-config is set
    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    // Apply command line overrides
    config.apply_args(args.tick_rate, args.startup_cycles, args.enable_all);
    config::utils::validate_specific_rules(&config)?;

    info!("Starting in daemon mode");
    let mut daemon = match args.cycles {
        Some(cycles) => Daemon::new().with_cycle_limit(cycles),
        None => Daemon::new(),
    };
    daemon.launch(&config).await?;
    let store = daemon.store();

    // Wait for the cycle limit or a termination signal
    tokio::select! {
        _ = daemon.stopped() => {
            info!("Daemon stopped after {} cycles", daemon.cycles());
        }
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal, terminating daemon"),
                Err(err) => eprintln!("Error waiting for shutdown signal: {}", err),
            }
        }
    }
    daemon.shutdown();
    daemon.join().await?;

    let report = serde_json::to_string_pretty(&store.to_json()?)?;
    match args.output {
        Some(path) => {
            info!("Saving parameters to: {}", path.display());
            std::fs::write(path, report)?;
        }
        None => println!("{}", report),
    }

    Ok(())
}
