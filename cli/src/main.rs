// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # CephFS Provisioner CLI
//!
//! The `cephfs-provisioner` binary runs the reconciliation controller or
//! performs one-shot operations against the configured backing store.
//!
//! ## Commands
//!
//! - `cephfs-provisioner run` - Reconcile claims until Ctrl-C / SIGTERM
//! - `cephfs-provisioner provision` - Allocate a single volume and print its descriptor
//! - `cephfs-provisioner config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cephfs_provisioner::commands::{self, ConfigCommand, ProvisionArgs};

/// CephFS volume provisioner
#[derive(Parser)]
#[command(name = "cephfs-provisioner")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CEPHFS_PROVISIONER_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        global = true,
        env = "CEPHFS_PROVISIONER_LOG_LEVEL",
        default_value = "info"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconciliation controller
    #[command(name = "run")]
    Run,

    /// Provision a single volume and print its descriptor
    #[command(name = "provision")]
    Provision(ProvisionArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run => commands::run::handle_command(cli.config).await,
        Commands::Provision(args) => commands::provision::handle_command(args, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
