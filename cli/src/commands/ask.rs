// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `tr5 ask` - one-shot completion with services embedded in the CLI process.
//!
//! Runs the same stateless chat cycle as `POST /api/chat`, so it is a quick
//! way to check which provider answers with the current keys.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tr5_core::application::chat::{ChatRequest, MemoryMode};
use tr5_core::application::fallback::FALLBACK_PROVIDER;
use tr5_core::domain::gateway_config::GatewayConfigManifest;
use tr5_core::presentation::api::AppState;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Message to send
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    /// Provider preference: auto, openai, groq, deepseek or huggingface
    #[arg(short, long, default_value = "auto")]
    pub model: String,

    /// Print the full response as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AskArgs, config: &GatewayConfigManifest) -> Result<()> {
    let state = AppState::from_config(config).context("Failed to initialize gateway services")?;

    let request = ChatRequest::text(args.message).with_model(args.model);
    let exchange = state.chat.handle(request, MemoryMode::Stateless).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&exchange)?);
        return Ok(());
    }

    let reply = exchange.reply().map(|m| m.text()).unwrap_or_default();
    println!("{}", reply);
    println!();

    let provider = if exchange.model_used == FALLBACK_PROVIDER {
        exchange.model_used.yellow()
    } else {
        exchange.model_used.green()
    };
    println!("{} {}", "Provider:".dimmed(), provider);

    Ok(())
}
