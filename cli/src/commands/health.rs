// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `tr5 health` - query `GET /api/health` on a running gateway

use anyhow::{Context, Result};
use colored::Colorize;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use tr5_core::domain::gateway_config::GatewayConfigManifest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uptime_seconds: u64,
    #[serde(default)]
    pub apis: BTreeMap<String, String>,
    pub database: DatabaseStatus,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseStatus {
    pub platform_url: String,
    pub connected: bool,
}

#[derive(Debug, Clone)]
pub struct HealthClient {
    client: Client,
    base_url: String,
}

impl HealthClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub async fn fetch(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(format!("{}/api/health", self.base_url.trim_end_matches('/')))
            .send()
            .await
            .with_context(|| format!("Gateway not reachable at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Health check failed ({}): {}", status, error_text);
        }

        response.json().await.context("Failed to parse health response")
    }
}

pub async fn run(config: &GatewayConfigManifest, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| match config.spec.server.bind_address.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1".to_string(),
        other => other.to_string(),
    });
    let port = port.unwrap_or(config.spec.server.port);

    let report = HealthClient::new(format!("http://{}:{}", host, port))?.fetch().await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &HealthReport) {
    let status = if report.status == "healthy" {
        report.status.green()
    } else {
        report.status.red()
    };
    println!("{} {}", report.service.bold(), status);
    if let Some(version) = &report.version {
        println!("  Version: {}", version);
    }
    println!("  Uptime: {}s", report.uptime_seconds);
    println!();

    println!("{}", "Providers:".bold());
    for (name, state) in &report.apis {
        let state = if state == "configured" {
            state.green()
        } else {
            state.dimmed()
        };
        println!("  {:<12} {}", name, state);
    }
    println!();

    println!("{}", "Memory platform:".bold());
    println!("  URL: {}", report.database.platform_url);
    println!(
        "  Connected: {}",
        if report.database.connected { "yes".green() } else { "no".yellow() }
    );
}
