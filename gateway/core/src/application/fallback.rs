// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Fallback Orchestrator
//!
//! Produces exactly one assistant reply per call by walking the provider
//! chain in priority order. The first non-empty completion wins; when every
//! candidate fails the reply is a canned Arabic template echoing the user.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Provider selection and graceful degradation
//! - **Integration:** ChatService → FallbackOrchestrator → ProviderRegistry
//!
//! Attempts are strictly sequential. A failed provider is never retried; the
//! chain moves straight to the next candidate. Without a chain budget the
//! worst-case latency is the sum of every attempted provider's timeout.

use metrics::counter;
use rand::seq::IndexedRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::gateway_config::GatewayConfigManifest;
use crate::domain::llm::{
    GenerationOptions, LLMError, ModelPreference, ProviderOutcome, ProviderResult,
};
use crate::domain::message::{last_user_text, Message};
use crate::infrastructure::llm::ProviderRegistry;

/// `providerUsed` reported when no provider produced a reply.
pub const FALLBACK_PROVIDER: &str = "Fallback";

const FALLBACK_TEMPLATES: [&str; 4] = [
    "شكراً لك على رسالتك: '{message}'. أنا مساعدك الذكي المدعوم بتقنيات الذكاء الاصطناعي المتقدمة.",
    "تلقيت رسالتك: '{message}'. كيف يمكنني مساعدتك أكثر؟",
    "أفهم أنك تقول: '{message}'. هل يمكنك توضيح المزيد حول ما تحتاجه؟",
    "بناءً على رسالتك: '{message}'، أعتقد أنني يمكنني مساعدتك. ما هو السؤال المحدد؟",
];

/// Render one of the canned replies, chosen uniformly at random.
pub fn fallback_reply(user_message: &str) -> String {
    let template = FALLBACK_TEMPLATES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_TEMPLATES[0]);
    template.replace("{message}", user_message)
}

/// Every reply `fallback_reply` can produce for `user_message`.
pub fn fallback_replies(user_message: &str) -> Vec<String> {
    FALLBACK_TEMPLATES
        .iter()
        .map(|t| t.replace("{message}", user_message))
        .collect()
}

/// Knobs shared by every chain run.
#[derive(Debug, Clone, Default)]
pub struct FallbackPolicy {
    pub options: GenerationOptions,
    /// Overall deadline for one chain. `None` keeps per-provider timeouts only.
    pub chain_budget: Option<Duration>,
}

impl FallbackPolicy {
    pub fn from_config(config: &GatewayConfigManifest) -> Self {
        Self {
            options: config.spec.generation.clone(),
            chain_budget: config.spec.selection.chain_budget,
        }
    }
}

/// The reply chosen for one request.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Never empty.
    pub text: String,
    /// Display label of the winning provider, or `FALLBACK_PROVIDER`.
    pub provider_used: String,
    /// One entry per provider actually consulted, in order.
    pub attempts: Vec<ProviderResult>,
}

impl Completion {
    pub fn is_fallback(&self) -> bool {
        self.provider_used == FALLBACK_PROVIDER
    }
}

pub struct FallbackOrchestrator {
    registry: Arc<ProviderRegistry>,
    policy: FallbackPolicy,
}

impl FallbackOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, policy: FallbackPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run the chain for `messages`. Never fails.
    pub async fn complete(&self, messages: &[Message], preference: ModelPreference) -> Completion {
        let deadline = self.policy.chain_budget.map(|budget| Instant::now() + budget);
        let mut attempts = Vec::new();

        for kind in preference.candidates() {
            let Some(provider) = self.registry.get(kind) else {
                debug!(provider = %kind, "Provider not registered, skipping");
                continue;
            };

            let outcome = match deadline {
                None => provider.complete(messages, &self.policy.options).await,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        warn!(provider = %kind, "Chain budget exhausted, skipping remaining providers");
                        break;
                    }
                    match tokio::time::timeout(remaining, provider.complete(messages, &self.policy.options)).await {
                        Ok(outcome) => outcome,
                        Err(_) => ProviderOutcome::Failed(LLMError::Timeout(remaining)),
                    }
                }
            };

            counter!(
                "tr5_provider_attempts_total",
                "provider" => kind.as_str(),
                "outcome" => outcome.label()
            )
            .increment(1);

            match outcome {
                ProviderOutcome::Completed(text) if !text.trim().is_empty() => {
                    info!(provider = %kind, chars = text.chars().count(), "Provider produced reply");
                    attempts.push(ProviderResult {
                        text: Some(text.clone()),
                        provider_name: kind.display_name().to_string(),
                    });
                    return Completion {
                        text,
                        provider_used: kind.display_name().to_string(),
                        attempts,
                    };
                }
                ProviderOutcome::Completed(_) => {
                    warn!(provider = %kind, "Provider returned blank reply, trying next candidate");
                }
                ProviderOutcome::Unavailable => {
                    debug!(provider = %kind, "Provider not configured, skipping");
                }
                ProviderOutcome::Failed(e) => {
                    warn!(provider = %kind, error = %e, "Provider call failed, trying next candidate");
                }
            }

            attempts.push(ProviderResult {
                text: None,
                provider_name: kind.display_name().to_string(),
            });
        }

        counter!("tr5_chat_fallback_total").increment(1);
        info!(preference = %preference, attempted = attempts.len(), "No provider replied, using templated fallback");

        let user_text = last_user_text(messages).unwrap_or_default();
        Completion {
            text: fallback_reply(user_text),
            provider_used: FALLBACK_PROVIDER.to_string(),
            attempts,
        }
    }
}
