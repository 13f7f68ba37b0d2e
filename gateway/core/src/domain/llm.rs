// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Vendor-neutral contract for chat completion providers.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Provider identity, selection preference and adapter outcomes

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// Adapters in infrastructure/llm/ translate this interface to each vendor's
// wire format. Adapters never return errors past this boundary: every call
// resolves to a `ProviderOutcome` that the fallback orchestrator matches on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::message::Message;

/// The vendors the gateway knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    DeepSeek,
    HuggingFace,
}

impl ProviderKind {
    /// Fixed priority order of the `auto` fallback chain.
    pub const CHAIN: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Groq,
        ProviderKind::DeepSeek,
        ProviderKind::HuggingFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    /// Label reported to clients as `modelUsed`.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI GPT-4",
            ProviderKind::Groq => "Groq Llama 3.3",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::HuggingFace => "HuggingFace",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::HuggingFace => "HUGGINGFACE_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_BASE_URL",
            ProviderKind::Groq => "GROQ_BASE_URL",
            ProviderKind::DeepSeek => "DEEPSEEK_BASE_URL",
            ProviderKind::HuggingFace => "HUGGINGFACE_BASE_URL",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "huggingface" => Ok(ProviderKind::HuggingFace),
            other => Err(LLMError::InvalidInput(format!("unknown provider: {other}"))),
        }
    }
}

/// Caller-supplied provider choice.
///
/// `Auto` walks the whole chain; `Only` attempts exactly one provider and
/// never falls through to the others. `Unmatched` names no known provider,
/// so nothing is attempted and the canned reply is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelPreference {
    #[default]
    Auto,
    Only(ProviderKind),
    Unmatched,
}

impl ModelPreference {
    /// Providers to attempt, in priority order.
    pub fn candidates(&self) -> Vec<ProviderKind> {
        match self {
            ModelPreference::Auto => ProviderKind::CHAIN.to_vec(),
            ModelPreference::Only(kind) => vec![*kind],
            ModelPreference::Unmatched => Vec::new(),
        }
    }
}

impl fmt::Display for ModelPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelPreference::Auto => f.write_str("auto"),
            ModelPreference::Only(kind) => kind.fmt(f),
            ModelPreference::Unmatched => f.write_str("unmatched"),
        }
    }
}

impl FromStr for ModelPreference {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(ModelPreference::Auto);
        }
        s.parse().map(ModelPreference::Only)
    }
}

/// Sampling parameters shared by every provider call in a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output length cap for text-generation endpoints that take `max_length`
    #[serde(default = "default_max_length")]
    pub max_length: u32,
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_length() -> u32 {
    200
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_length: default_max_length(),
        }
    }
}

/// Domain interface for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether a credential is present. Unconfigured providers answer
    /// `ProviderOutcome::Unavailable` without touching the network.
    fn is_configured(&self) -> bool;

    /// Produce a reply for the conversation.
    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> ProviderOutcome;
}

/// Result of a single adapter call.
#[derive(Debug)]
pub enum ProviderOutcome {
    /// Non-empty reply text.
    Completed(String),
    /// No credential configured; skip without logging an error.
    Unavailable,
    /// The call was made and did not yield usable text.
    Failed(LLMError),
}

impl ProviderOutcome {
    /// Fold an adapter's internal result into an outcome. Blank text counts
    /// as a failure.
    pub fn from_result(result: Result<String, LLMError>) -> Self {
        match result {
            Ok(text) if text.trim().is_empty() => ProviderOutcome::Failed(LLMError::EmptyCompletion),
            Ok(text) => ProviderOutcome::Completed(text),
            Err(e) => ProviderOutcome::Failed(e),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Completed(_) => "completed",
            ProviderOutcome::Unavailable => "unavailable",
            ProviderOutcome::Failed(_) => "failed",
        }
    }
}

/// Record of one attempt in a chain. `text` is `None` unless the provider
/// produced a usable reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub text: Option<String>,
    pub provider_name: String,
}

/// Errors that can occur inside a provider adapter
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parses_auto_and_vendors() {
        assert_eq!("auto".parse::<ModelPreference>().unwrap(), ModelPreference::Auto);
        assert_eq!(
            "DeepSeek".parse::<ModelPreference>().unwrap(),
            ModelPreference::Only(ProviderKind::DeepSeek)
        );
        assert!("gemini".parse::<ModelPreference>().is_err());
    }

    #[test]
    fn preference_candidates_follow_chain_order() {
        assert_eq!(ModelPreference::Auto.candidates(), ProviderKind::CHAIN.to_vec());
        assert_eq!(
            ModelPreference::Only(ProviderKind::Groq).candidates(),
            vec![ProviderKind::Groq]
        );
        assert!(ModelPreference::Unmatched.candidates().is_empty());
    }

    #[test]
    fn blank_completion_is_a_failure() {
        assert!(matches!(
            ProviderOutcome::from_result(Ok("  \n".into())),
            ProviderOutcome::Failed(LLMError::EmptyCompletion)
        ));
        assert!(matches!(
            ProviderOutcome::from_result(Ok("hi".into())),
            ProviderOutcome::Completed(t) if t == "hi"
        ));
    }
}
