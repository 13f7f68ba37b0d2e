// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Hand-written stubs shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tr5_core::application::fallback::{FallbackOrchestrator, FallbackPolicy};
use tr5_core::domain::llm::{ChatProvider, GenerationOptions, LLMError, ProviderKind, ProviderOutcome};
use tr5_core::domain::memory::{ActivityRecord, ConversationMemory, MemoryError, TrainingData};
use tr5_core::domain::message::{ConversationTurn, Message};
use tr5_core::infrastructure::llm::ProviderRegistry;

#[derive(Clone)]
pub enum StubReply {
    Text(String),
    Unavailable,
    Fail,
    Blank,
}

pub struct StubProvider {
    kind: ProviderKind,
    reply: StubReply,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl StubProvider {
    pub fn new(kind: ProviderKind, reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(kind: ProviderKind, reply: StubReply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_configured(&self) -> bool {
        !matches!(self.reply, StubReply::Unavailable)
    }

    async fn complete(&self, messages: &[Message], _options: &GenerationOptions) -> ProviderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            StubReply::Text(text) => ProviderOutcome::Completed(text.clone()),
            StubReply::Unavailable => ProviderOutcome::Unavailable,
            StubReply::Fail => ProviderOutcome::Failed(LLMError::Provider("HTTP 500".into())),
            StubReply::Blank => ProviderOutcome::Completed("   ".into()),
        }
    }
}

/// One stub per chain position, in `ProviderKind::CHAIN` order.
pub fn chain(replies: [StubReply; 4]) -> Vec<Arc<StubProvider>> {
    ProviderKind::CHAIN
        .iter()
        .zip(replies)
        .map(|(kind, reply)| StubProvider::new(*kind, reply))
        .collect()
}

pub fn registry(stubs: &[Arc<StubProvider>]) -> Arc<ProviderRegistry> {
    let providers: Vec<Arc<dyn ChatProvider>> = stubs
        .iter()
        .map(|s| s.clone() as Arc<dyn ChatProvider>)
        .collect();
    Arc::new(ProviderRegistry::from_providers(providers))
}

pub fn orchestrator(stubs: &[Arc<StubProvider>]) -> Arc<FallbackOrchestrator> {
    Arc::new(FallbackOrchestrator::new(registry(stubs), FallbackPolicy::default()))
}

/// In-process memory platform that records every call.
#[derive(Default)]
pub struct StubMemory {
    pub context: Vec<Message>,
    pub failing: bool,
    pub training_id: Option<i64>,
    pub patterns: Vec<serde_json::Value>,
    pub context_requests: Mutex<Vec<(String, usize)>>,
    pub turns: Mutex<Vec<ConversationTurn>>,
    pub activities: Mutex<Vec<ActivityRecord>>,
    pub training: Mutex<Vec<TrainingData>>,
}

impl StubMemory {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    fn check(&self) -> Result<(), MemoryError> {
        if self.failing {
            Err(MemoryError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConversationMemory for StubMemory {
    async fn get_context(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, MemoryError> {
        self.context_requests
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), limit));
        self.check()?;
        Ok(self.context.iter().take(limit).cloned().collect())
    }

    async fn save_turn(&self, turn: &ConversationTurn) -> Result<(), MemoryError> {
        self.turns.lock().unwrap().push(turn.clone());
        self.check()
    }

    async fn log_activity(&self, activity: &ActivityRecord) -> Result<(), MemoryError> {
        self.activities.lock().unwrap().push(activity.clone());
        self.check()
    }

    async fn save_training_data(&self, data: &TrainingData) -> Result<Option<i64>, MemoryError> {
        self.training.lock().unwrap().push(data.clone());
        self.check()?;
        Ok(self.training_id)
    }

    async fn extract_patterns(
        &self,
        _user_id: i64,
        _conversation_id: &str,
    ) -> Result<Vec<serde_json::Value>, MemoryError> {
        self.check()?;
        Ok(self.patterns.clone())
    }

    fn is_configured(&self) -> bool {
        !self.failing
    }

    fn platform_url(&self) -> &str {
        "http://platform.test"
    }
}
