// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # TR5 Gateway CLI
//!
//! The `tr5` binary runs the chat gateway and offers a few operator tools
//! around it.
//!
//! ## Commands
//!
//! - `tr5 serve` - Run the HTTP gateway
//! - `tr5 ask <MESSAGE>` - One-shot completion through the fallback chain, no server needed
//! - `tr5 health` - Query a running gateway's health endpoint
//! - `tr5 config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use tr5_core::domain::gateway_config::GatewayConfigManifest;
use tr5_gateway::commands::{self, AskArgs, ConfigCommand};

/// TR5 Gateway - multi-provider chat with conversation memory
#[derive(Parser)]
#[command(name = "tr5")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "TR5_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP port (default: spec.server.port)
    #[arg(long, global = true, env = "TR5_PORT")]
    port: Option<u16>,

    /// HTTP host (default: spec.server.bind_address)
    #[arg(long, global = true, env = "TR5_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TR5_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    #[command(name = "serve")]
    Serve,

    /// Ask a single question through the provider chain
    #[command(name = "ask")]
    Ask(AskArgs),

    /// Check a running gateway
    #[command(name = "health")]
    Health,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is the normal case
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("{}", "No command specified. Use --help for usage.".yellow());
        std::process::exit(1);
    };

    match command {
        Commands::Config { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        Commands::Serve => {
            let config = load_config(cli.config, cli.log_level.as_deref())?;
            commands::serve::run(config, cli.host, cli.port).await
        }
        Commands::Ask(args) => {
            let config = load_config(cli.config, cli.log_level.as_deref())?;
            commands::ask::run(args, &config).await
        }
        Commands::Health => {
            let config = load_config(cli.config, cli.log_level.as_deref())?;
            commands::health::run(&config, cli.host, cli.port).await
        }
    }
}

/// Load configuration, then start logging with the configured level and
/// format (`--log-level` and `RUST_LOG` take precedence).
fn load_config(path: Option<PathBuf>, log_level: Option<&str>) -> Result<GatewayConfigManifest> {
    let config = GatewayConfigManifest::load_or_default(path).context("Failed to load configuration")?;

    let logging = &config.spec.observability.logging;
    init_logging(log_level.unwrap_or(&logging.level), &logging.format)?;
    info!(name = %config.metadata.name, "Configuration loaded");

    Ok(config)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).compact().init();
    }

    Ok(())
}
