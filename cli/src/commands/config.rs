// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use tr5_core::domain::gateway_config::{GatewayConfigManifest, CONFIG_PATH_ENV};
use tr5_core::domain::llm::ProviderKind;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

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
        /// Output path (default: ./tr5-config.yaml)
        #[arg(short, long, default_value = "./tr5-config.yaml")]
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
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        for (i, path) in GatewayConfigManifest::candidate_paths().iter().enumerate() {
            let marker = if path.exists() { "found".green() } else { "missing".dimmed() };
            println!("  {}. {} ({})", i + 2, path.display(), marker);
        }
        println!(
            "  ({}: {})",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Gateway:".bold());
    println!("  Name: {}", config.metadata.name);
    println!(
        "  Listen: {}:{}",
        config.spec.server.bind_address, config.spec.server.port
    );
    if let Some(dir) = &config.spec.server.static_dir {
        println!("  Static files: {}", dir.display());
    }
    println!();

    println!("{}", "LLM Providers (fallback order):".bold());
    for kind in ProviderKind::CHAIN {
        let provider = config.spec.providers.get(kind);
        let key = if provider.resolved_api_key().is_some() {
            "configured".green()
        } else if !provider.enabled {
            "disabled".yellow()
        } else {
            "not configured".dimmed()
        };
        println!("  {} ({})", kind.display_name().bold(), key);
        println!("    Endpoint: {}", provider.endpoint);
        println!("    Model: {}", provider.model);
        println!("    Timeout: {:?}", provider.timeout);
    }
    println!();

    println!("{}", "Selection:".bold());
    match config.spec.selection.chain_budget {
        Some(budget) => println!("  Chain budget: {:?}", budget),
        None => println!("  Chain budget: {}", "(none)".dimmed()),
    }
    println!();

    println!("{}", "Memory Platform:".bold());
    println!("  URL: {}", config.spec.memory.platform_url);
    println!(
        "  API key: {}",
        if config.spec.memory.resolved_api_key().is_some() {
            "configured".green()
        } else {
            "not configured".dimmed()
        }
    );
    println!("  Context limit: {}", config.spec.memory.context_limit);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_templates_are_valid_manifests() {
        for template in [MINIMAL_TEMPLATE, EXAMPLES_TEMPLATE] {
            let config = GatewayConfigManifest::from_yaml_str(template).unwrap();
            config.validate().unwrap();
            assert_eq!(config.spec.providers.groq.model, "llama-3.3-70b-versatile");
        }

        let config = GatewayConfigManifest::from_yaml_str(EXAMPLES_TEMPLATE).unwrap();
        assert_eq!(config.spec.selection.chain_budget, Some(Duration::from_secs(45)));
        assert_eq!(config.spec.chat.stream_delay, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_generate_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("tr5-config.yaml");

        generate(&output, true).await.unwrap();

        let config = GatewayConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(config.metadata.name, "tr5-gateway");
        assert_eq!(config.spec.server.port, 3000);
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(
            &path,
            MINIMAL_TEMPLATE.replace("kind: GatewayConfig", "kind: NodeConfig"),
        )
        .unwrap();

        let err = validate(Some(path)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid kind"));
    }
}
