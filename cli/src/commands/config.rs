// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use cephfs_provisioner_core::domain::provisioner_config::{
    GatewayConfig, ProvisionerConfigManifest, CONFIG_PATH_ENV,
};

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
pub const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./cephfs-provisioner.yaml)
        #[arg(short, long, default_value = "./cephfs-provisioner.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ProvisionerConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./cephfs-provisioner.yaml");
        println!("  4. ~/.cephfs-provisioner/config.yaml");
        println!("  5. /etc/cephfs-provisioner/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let provisioner = &config.spec.provisioner;
    println!("{}", "Controller:".bold());
    println!("  Provisioner name: {}", provisioner.name);
    println!("  Resync period: {:?}", provisioner.resync_period);
    println!(
        "  Exponential backoff: {}",
        provisioner.exponential_backoff_on_error
    );
    println!(
        "  Failed retry threshold: {}",
        provisioner.failed_retry_threshold
    );
    println!();

    let ceph = &config.spec.ceph;
    println!("{}", "Ceph:".bold());
    println!("  Monitors: {}", ceph.monitors.join(", "));
    println!("  Admin: {}", ceph.admin);
    match &ceph.secret_ref.namespace {
        Some(namespace) => println!("  Secret: {}/{}", namespace, ceph.secret_ref.name),
        None => println!("  Secret: {}", ceph.secret_ref.name),
    }
    println!("  Root path: {}", ceph.root_path);
    println!();

    println!("{}", "Gateway:".bold());
    match &config.spec.gateway {
        GatewayConfig::Mounted { mount_root } => {
            println!("  Type: mounted ({})", mount_root.display())
        }
        GatewayConfig::Memory => println!("  Type: memory"),
    }
    println!("  State directory: {}", config.spec.state.dir.display());
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ProvisionerConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    tokio::fs::write(&output, sample)
        .await
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
