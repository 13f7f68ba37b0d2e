// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Chat
//!
//! One request/response cycle of the chat endpoint: validate the inbound
//! message, optionally pull conversation memory, run the fallback chain and
//! record the exchange.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Compose `FallbackOrchestrator` and `ConversationMemory`
//! - **Integration:** HTTP handlers / CLI → ChatService
//!
//! Memory is best-effort throughout. A failed context fetch degrades to an
//! empty history; a failed save or activity log is logged and the reply is
//! still returned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::fallback::{Completion, FallbackOrchestrator};
use crate::domain::gateway_config::GatewayConfigManifest;
use crate::domain::llm::ModelPreference;
use crate::domain::memory::{ActivityRecord, ConversationMemory, MemoryError};
use crate::domain::message::{ConversationTurn, IncomingMessage, Message, Role, UiMessage};

const DEFAULT_USER_ID: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Rejected before reaching the orchestrator; surfaced to the caller as 400.
    #[error("{0}")]
    Validation(String),
}

/// Whether a chat cycle reads and writes conversation memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Stateful,
    Stateless,
}

/// The `message` field: a structured frontend message or a bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Structured(IncomingMessage),
}

impl MessageBody {
    fn is_blank_payload(&self) -> bool {
        match self {
            MessageBody::Text(text) => text.is_empty(),
            MessageBody::Structured(msg) => msg.parts.is_none() && msg.content.is_none(),
        }
    }

    fn text(&self) -> String {
        match self {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Structured(msg) => msg.text(),
        }
    }
}

/// Inbound chat request. Field aliases accept both frontend spellings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<MessageBody>,

    #[serde(default, alias = "conversationId")]
    pub id: Option<String>,

    #[serde(default = "default_user_id")]
    pub user_id: i64,

    #[serde(default)]
    pub session_id: Option<i64>,

    #[serde(default, alias = "modelPreference")]
    pub model: Option<String>,
}

fn default_user_id() -> i64 {
    DEFAULT_USER_ID
}

impl ChatRequest {
    /// A request carrying only a user text.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: Some(MessageBody::Text(message.into())),
            id: None,
            user_id: DEFAULT_USER_ID,
            session_id: None,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_conversation(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode a raw request body. An empty or `null` body is a validation
    /// failure rather than a decode error.
    pub fn from_body(body: &[u8]) -> Result<Self, ChatError> {
        let value: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(body)
                .map_err(|e| ChatError::Validation(format!("Invalid JSON body: {e}")))?
        };

        match &value {
            serde_json::Value::Null => return Err(ChatError::Validation("No data provided".into())),
            serde_json::Value::Object(map) if map.is_empty() => {
                return Err(ChatError::Validation("No data provided".into()))
            }
            _ => {}
        }

        serde_json::from_value(value).map_err(|e| ChatError::Validation(format!("Invalid request: {e}")))
    }

    /// Non-blank user text, or the validation error to report.
    pub fn user_text(&self) -> Result<String, ChatError> {
        let message = self
            .message
            .as_ref()
            .filter(|m| !m.is_blank_payload())
            .ok_or_else(|| ChatError::Validation("No message provided".into()))?;

        let text = message.text();
        if text.trim().is_empty() {
            return Err(ChatError::Validation("Empty message".into()));
        }
        Ok(text)
    }

    /// Requested provider. A name matching no provider yields
    /// `Unmatched`, which goes straight to the canned reply.
    pub fn preference(&self) -> ModelPreference {
        match self.model.as_deref().map(str::trim) {
            None | Some("") => ModelPreference::Auto,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(model = raw, "Unrecognised model preference, no provider will be attempted");
                ModelPreference::Unmatched
            }),
        }
    }
}

/// Response body of the chat endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub messages: Vec<UiMessage>,
    pub chat_id: String,
    pub status: String,
    pub model_used: String,
}

impl ChatExchange {
    pub fn reply(&self) -> Option<&UiMessage> {
        self.messages.iter().find(|m| m.role == Role::Assistant)
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub stateless_system_prompt: String,
    pub context_limit: usize,
}

impl ChatSettings {
    pub fn from_config(config: &GatewayConfigManifest) -> Self {
        Self {
            system_prompt: config.spec.chat.system_prompt.clone(),
            stateless_system_prompt: config.spec.chat.stateless_system_prompt.clone(),
            context_limit: config.spec.memory.context_limit,
        }
    }
}

pub struct ChatService {
    orchestrator: Arc<FallbackOrchestrator>,
    memory: Arc<dyn ConversationMemory>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        orchestrator: Arc<FallbackOrchestrator>,
        memory: Arc<dyn ConversationMemory>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            orchestrator,
            memory,
            settings,
        }
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    pub fn memory(&self) -> &Arc<dyn ConversationMemory> {
        &self.memory
    }

    /// Run one chat cycle.
    pub async fn handle(&self, request: ChatRequest, mode: MemoryMode) -> Result<ChatExchange, ChatError> {
        let user_text = request.user_text()?;
        let preference = request.preference();
        let chat_id = request
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (system_prompt, context) = match mode {
            MemoryMode::Stateful => (
                self.settings.system_prompt.as_str(),
                self.load_context(&chat_id, self.settings.context_limit).await,
            ),
            MemoryMode::Stateless => (self.settings.stateless_system_prompt.as_str(), Vec::new()),
        };

        let mut prompt = Vec::with_capacity(context.len() + 2);
        prompt.push(Message::system(system_prompt));
        prompt.extend(context);
        prompt.push(Message::user(user_text.clone()));

        let user_message = UiMessage::new(Role::User, user_text.clone());
        let completion = self.orchestrator.complete(&prompt, preference).await;

        info!(
            chat_id = %chat_id,
            model_used = %completion.provider_used,
            stateful = mode == MemoryMode::Stateful,
            "Chat reply ready"
        );

        if mode == MemoryMode::Stateful {
            self.record(&request, &chat_id, &user_text, &completion).await;
        }

        let assistant_message =
            UiMessage::new(Role::Assistant, completion.text).with_model(completion.provider_used.clone());

        Ok(ChatExchange {
            messages: vec![user_message, assistant_message],
            chat_id,
            status: "success".to_string(),
            model_used: completion.provider_used,
        })
    }

    /// Prior messages of a conversation; empty when memory is unavailable.
    pub async fn load_context(&self, conversation_id: &str, limit: usize) -> Vec<Message> {
        match self.memory.get_context(conversation_id, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                log_memory_failure("get_context", &e);
                Vec::new()
            }
        }
    }

    /// Patterns mined from a conversation; empty when memory is unavailable.
    pub async fn patterns(&self, user_id: i64, conversation_id: &str) -> Vec<serde_json::Value> {
        match self.memory.extract_patterns(user_id, conversation_id).await {
            Ok(patterns) => patterns,
            Err(e) => {
                log_memory_failure("extract_patterns", &e);
                Vec::new()
            }
        }
    }

    async fn record(&self, request: &ChatRequest, chat_id: &str, user_text: &str, completion: &Completion) {
        let turn = ConversationTurn {
            conversation_id: chat_id.to_string(),
            user_id: request.user_id,
            session_id: request.session_id,
            user_message: user_text.to_string(),
            assistant_message: completion.text.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.memory.save_turn(&turn).await {
            log_memory_failure("save_turn", &e);
        }

        let activity = ActivityRecord {
            user_id: request.user_id,
            action: "chat_interaction".to_string(),
            resource_type: Some("conversation".to_string()),
            resource_id: None,
            details: serde_json::json!({
                "conversation_id": chat_id,
                "model_used": completion.provider_used,
                "message_length": user_text.chars().count(),
            }),
            status: "success".to_string(),
        };
        if let Err(e) = self.memory.log_activity(&activity).await {
            log_memory_failure("log_activity", &e);
        }
    }
}

pub(crate) fn log_memory_failure(operation: &str, error: &MemoryError) {
    match error {
        MemoryError::NotConfigured => debug!(operation, "Memory platform not configured, skipping"),
        e => warn!(operation, error = %e, "Memory platform call failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_validation_messages() {
        let err = ChatRequest::from_body(b"").unwrap_err();
        assert_eq!(err.to_string(), "No data provided");

        let err = ChatRequest::from_body(b"{}").unwrap_err();
        assert_eq!(err.to_string(), "No data provided");

        let request = ChatRequest::from_body(br#"{"id": "c1"}"#).unwrap();
        assert_eq!(request.user_text().unwrap_err().to_string(), "No message provided");

        let request = ChatRequest::from_body(br#"{"message": {"parts": [{"type": "text", "text": "  "}]}}"#).unwrap();
        assert_eq!(request.user_text().unwrap_err().to_string(), "Empty message");
    }

    #[test]
    fn parts_take_precedence_over_content() {
        let request = ChatRequest::from_body(
            r#"{"message": {"parts": [{"type": "text", "text": "مر"}, {"type": "image", "text": "x"}, {"type": "text", "text": "حبا"}], "content": "ignored"}}"#
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(request.user_text().unwrap(), "مرحبا");
        assert_eq!(request.user_id, 1);
    }

    #[test]
    fn aliases_and_preference() {
        let request = ChatRequest::from_body(
            br#"{"message": {"content": "hi"}, "conversationId": "abc", "modelPreference": "groq", "userId": 9}"#,
        )
        .unwrap();
        assert_eq!(request.id.as_deref(), Some("abc"));
        assert_eq!(request.user_id, 9);
        assert_eq!(
            request.preference(),
            ModelPreference::Only(crate::domain::llm::ProviderKind::Groq)
        );

        let request = ChatRequest::text("hi").with_model("gemini");
        assert_eq!(request.preference(), ModelPreference::Unmatched);
        assert_eq!(ChatRequest::text("hi").preference(), ModelPreference::Auto);
        assert_eq!(ChatRequest::text("hi").with_model("  ").preference(), ModelPreference::Auto);
    }

    #[test]
    fn bare_string_message_is_accepted() {
        let request = ChatRequest::from_body(br#"{"message": "hello"}"#).unwrap();
        assert_eq!(request.user_text().unwrap(), "hello");
    }
}
