// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - HTTP server binding, CORS and optional SPA hosting
// - Per-vendor provider credentials, endpoints, models and timeouts
// - Fallback chain budget
// - Remote memory platform connection
// - Chat prompts and stream pacing
// - Logging and metrics settings
//
// Secrets accept "env:VAR_NAME". Well-known environment variables override
// whatever the file says (see `apply_overrides`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::llm::{GenerationOptions, ProviderKind};

pub const API_VERSION: &str = "tr5.chat/v1";
pub const KIND: &str = "GatewayConfig";
pub const CONFIG_PATH_ENV: &str = "TR5_CONFIG_PATH";

/// Top-level gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "tr5.chat/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub generation: GenerationOptions,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Directory with the built chat frontend, served for unknown paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_allowed_origins: vec![],
            static_dir: None,
        }
    }
}

/// One block per vendor; the chain order itself is fixed by `ProviderKind::CHAIN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_openai")]
    pub openai: ProviderSettings,

    #[serde(default = "default_groq")]
    pub groq: ProviderSettings,

    #[serde(default = "default_deepseek")]
    pub deepseek: ProviderSettings,

    #[serde(default = "default_huggingface")]
    pub huggingface: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Groq => &self.groq,
            ProviderKind::DeepSeek => &self.deepseek,
            ProviderKind::HuggingFace => &self.huggingface,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Groq => &mut self.groq,
            ProviderKind::DeepSeek => &mut self.deepseek,
            ProviderKind::HuggingFace => &mut self.huggingface,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: default_openai(),
            groq: default_groq(),
            deepseek: default_deepseek(),
            huggingface: default_huggingface(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL (OpenAI-compatible vendors) or full model URL (HuggingFace)
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME"); absent or empty means "not configured"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent to the vendor
    pub model: String,

    /// Per-call timeout
    #[serde(default = "default_provider_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Disabled providers behave as if no key were configured
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderSettings {
    pub fn for_kind(kind: ProviderKind) -> Self {
        let (endpoint, model) = match kind {
            ProviderKind::OpenAi => ("https://api.openai.com/v1", "gpt-4o-mini"),
            ProviderKind::Groq => ("https://api.groq.com/openai/v1", "llama-3.3-70b-versatile"),
            ProviderKind::DeepSeek => ("https://api.deepseek.com/v1", "deepseek-chat"),
            ProviderKind::HuggingFace => (
                "https://api-inference.huggingface.co/models/microsoft/DialoGPT-medium",
                "microsoft/DialoGPT-medium",
            ),
        };
        Self {
            endpoint: endpoint.to_string(),
            api_key: Some(format!("env:{}", kind.api_key_env())),
            model: model.to_string(),
            timeout: default_provider_timeout(),
            enabled: true,
        }
    }

    /// Effective credential, or `None` when the provider should be skipped.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        resolve_secret(self.api_key.as_deref(), |var| std::env::var(var).ok())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Optional upper bound on the whole fallback chain. Unset means the
    /// worst case is the sum of the per-provider timeouts.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub chain_budget: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_platform_url")]
    pub platform_url: String,

    #[serde(default = "default_platform_key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_memory_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Prior messages pulled into each stateful chat request
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// Default `limit` of the context lookup endpoint
    #[serde(default = "default_context_endpoint_limit")]
    pub context_endpoint_default_limit: usize,
}

impl MemoryConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_secret(self.api_key.as_deref(), |var| std::env::var(var).ok())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            platform_url: default_platform_url(),
            api_key: default_platform_key(),
            timeout: default_memory_timeout(),
            context_limit: default_context_limit(),
            context_endpoint_default_limit: default_context_endpoint_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// System prompt for memory-backed conversations
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// System prompt for the stateless endpoints
    #[serde(default = "default_stateless_system_prompt")]
    pub stateless_system_prompt: String,

    /// Pause between simulated stream events
    #[serde(default = "default_stream_delay", with = "humantime_serde")]
    pub stream_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            stateless_system_prompt: default_stateless_system_prompt(),
            stream_delay: default_stream_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_openai() -> ProviderSettings {
    ProviderSettings::for_kind(ProviderKind::OpenAi)
}

fn default_groq() -> ProviderSettings {
    ProviderSettings::for_kind(ProviderKind::Groq)
}

fn default_deepseek() -> ProviderSettings {
    ProviderSettings::for_kind(ProviderKind::DeepSeek)
}

fn default_huggingface() -> ProviderSettings {
    ProviderSettings::for_kind(ProviderKind::HuggingFace)
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_platform_url() -> String {
    "https://aitrainhub-ifghcdxx.manus.space".to_string()
}

fn default_platform_key() -> Option<String> {
    Some("env:PLATFORM_API_KEY".to_string())
}

fn default_memory_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_context_limit() -> usize {
    5
}

fn default_context_endpoint_limit() -> usize {
    10
}

fn default_system_prompt() -> String {
    "أنت مساعد ذكي ومفيد. تجيب باللغة العربية بطريقة ودودة ومهنية. لديك ذاكرة طويلة المدى وتستطيع تذكر المحادثات السابقة.".to_string()
}

fn default_stateless_system_prompt() -> String {
    "أنت TR5، روبوت دردشة ذكي ومفيد. تجيب باللغة العربية بطريقة ودودة ومهنية.".to_string()
}

fn default_stream_delay() -> Duration {
    Duration::from_millis(50)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

/// Resolve a secret that may be written as "env:VAR_NAME". Empty values
/// resolve to `None`.
pub fn resolve_secret(raw: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let value = match raw?.strip_prefix("env:") {
        Some(var_name) => lookup(var_name)?,
        None => raw?.to_string(),
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "tr5-gateway".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. TR5_CONFIG_PATH environment variable
    /// 2. ./tr5-config.yaml (working directory)
    /// 3. ~/.tr5/config.yaml (user home)
    /// 4. /etc/tr5/config.yaml (system, Unix) or C:\ProgramData\TR5\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|p| p.exists())
    }

    /// Every location `discover_config` checks, in order.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(path));
        }

        paths.push(PathBuf::from("./tr5-config.yaml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".tr5").join("config.yaml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/tr5/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\TR5\\config.yaml"));

        paths
    }

    /// Load configuration with discovery, fallback to defaults. Environment
    /// overrides are applied in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for kind in ProviderKind::CHAIN {
            let settings = self.spec.providers.get_mut(kind);
            if let Some(key) = non_empty(kind.api_key_env()) {
                tracing::debug!("Environment override: {} set", kind.api_key_env());
                settings.api_key = Some(key);
            }
            if let Some(url) = non_empty(kind.base_url_env()) {
                tracing::info!("Environment override: {}={}", kind.base_url_env(), url);
                settings.endpoint = url;
            }
        }

        if let Some(url) = non_empty("PLATFORM_API_URL") {
            tracing::info!("Environment override: PLATFORM_API_URL={}", url);
            self.spec.memory.platform_url = url;
        }
        if let Some(key) = non_empty("PLATFORM_API_KEY") {
            self.spec.memory.api_key = Some(key);
        }

        if let Some(port) = non_empty("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.spec.server.port = port,
                Err(_) => tracing::warn!("Invalid value for PORT: '{}'. Ignoring.", port),
            }
        }

        if let Some(budget) = non_empty("TR5_CHAIN_BUDGET") {
            match humantime_serde::re::humantime::parse_duration(budget.trim()) {
                Ok(duration) => self.spec.selection.chain_budget = Some(duration),
                Err(e) => tracing::warn!(
                    "Invalid value for TR5_CHAIN_BUDGET: '{}' ({}). Ignoring.",
                    budget,
                    e
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for kind in ProviderKind::CHAIN {
            let provider = self.spec.providers.get(kind);
            if provider.endpoint.trim().is_empty() {
                anyhow::bail!("Provider endpoint cannot be empty for: {}", kind);
            }
            if provider.model.trim().is_empty() {
                anyhow::bail!("Provider model cannot be empty for: {}", kind);
            }
            if provider.timeout.is_zero() {
                anyhow::bail!("Provider timeout must be positive for: {}", kind);
            }
        }

        if let Some(budget) = self.spec.selection.chain_budget {
            if budget.is_zero() {
                anyhow::bail!("selection.chain_budget must be positive when set");
            }
        }

        if self.spec.memory.platform_url.trim().is_empty() {
            anyhow::bail!("memory.platform_url cannot be empty");
        }
        if self.spec.memory.timeout.is_zero() {
            anyhow::bail!("memory.timeout must be positive");
        }
        if self.spec.memory.context_limit == 0 {
            anyhow::bail!("memory.context_limit must be at least 1");
        }

        if self.spec.chat.system_prompt.trim().is_empty()
            || self.spec.chat.stateless_system_prompt.trim().is_empty()
        {
            anyhow::bail!("chat system prompts cannot be empty");
        }

        match self.spec.observability.logging.format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("Invalid logging format: '{}'. Expected json or text", other),
        }

        Ok(())
    }
}
