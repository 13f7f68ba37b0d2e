// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry
//
// Builds one adapter per vendor from the gateway configuration and hands
// them out in fallback-chain order. Adapters are created even without a
// credential: an unconfigured adapter reports `Unavailable` on its own, so
// the orchestrator never special-cases missing keys.

use crate::domain::gateway_config::{GatewayConfigManifest, ProviderSettings};
use crate::domain::llm::{ChatProvider, ProviderKind};
use std::sync::Arc;
use tracing::info;

use super::huggingface::HuggingFaceAdapter;
use super::openai_compatible::OpenAiCompatibleAdapter;

/// Registry of provider adapters, ordered by `ProviderKind::CHAIN`.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    /// Create provider registry from gateway configuration
    pub fn from_config(config: &GatewayConfigManifest) -> anyhow::Result<Self> {
        info!("Initializing LLM provider registry");

        let mut providers = Vec::with_capacity(ProviderKind::CHAIN.len());
        for kind in ProviderKind::CHAIN {
            let settings = config.spec.providers.get(kind);
            let provider = Self::create_provider(kind, settings)?;
            info!(
                provider = %kind,
                model = %settings.model,
                configured = provider.is_configured(),
                "Registered provider"
            );
            providers.push(provider);
        }

        if !providers.iter().any(|p| p.is_configured()) {
            tracing::warn!("No LLM provider has an API key - every reply will use the templated fallback");
        }

        Ok(Self::from_providers(providers))
    }

    /// Build a registry from ready-made adapters (one per kind).
    pub fn from_providers(mut providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        providers.sort_by_key(|p| p.kind());
        providers.dedup_by_key(|p| p.kind());
        Self { providers }
    }

    fn create_provider(
        kind: ProviderKind,
        settings: &ProviderSettings,
    ) -> anyhow::Result<Arc<dyn ChatProvider>> {
        let api_key = settings.resolved_api_key();

        let provider: Arc<dyn ChatProvider> = match kind {
            ProviderKind::OpenAi | ProviderKind::Groq | ProviderKind::DeepSeek => {
                Arc::new(OpenAiCompatibleAdapter::new(
                    kind,
                    settings.endpoint.clone(),
                    api_key,
                    settings.model.clone(),
                    settings.timeout,
                )?)
            }
            ProviderKind::HuggingFace => Arc::new(HuggingFaceAdapter::new(
                settings.endpoint.clone(),
                api_key,
                settings.timeout,
            )?),
        };

        Ok(provider)
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ChatProvider>> {
        self.providers.iter().find(|p| p.kind() == kind).cloned()
    }

    /// Whether each known provider has a credential, in chain order.
    pub fn configuration_status(&self) -> Vec<(ProviderKind, bool)> {
        ProviderKind::CHAIN
            .iter()
            .map(|kind| (*kind, self.get(*kind).is_some_and(|p| p.is_configured())))
            .collect()
    }
}
