// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

// Chat message types
//
// `Message` is what providers see. `UiMessage` is the parts-based shape the
// chat frontend sends and receives. `ConversationTurn` is the unit handed to
// the memory gateway once a reply exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A single entry in the provider-facing conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Newest user message in a conversation, if any.
pub fn last_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: "text".to_string(), text: text.into() }
    }
}

/// Inbound message as sent by the chat frontend.
///
/// The frontend sends either `parts` (preferred) or a flat `content` string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
    #[serde(default)]
    pub content: Option<String>,
}

impl IncomingMessage {
    /// Concatenated text of every `text` part, else `content`.
    pub fn text(&self) -> String {
        match &self.parts {
            Some(parts) => parts
                .iter()
                .filter(|p| p.kind == "text")
                .map(|p| p.text.as_str())
                .collect(),
            None => self.content.clone().unwrap_or_default(),
        }
    }
}

/// Outbound message in the frontend's parts-based shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl UiMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts: vec![MessagePart::text(text)],
            created_at: Utc::now(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// One user/assistant exchange, handed to the memory gateway after the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub conversation_id: String,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    pub user_message: String,
    pub assistant_message: String,
    pub timestamp: DateTime<Utc>,
}

/// Rough token estimate used by the platform (four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_parts_take_precedence_over_content() {
        let msg: IncomingMessage = serde_json::from_str(
            r#"{"parts":[{"type":"text","text":"مر"},{"type":"image","text":"x"},{"type":"text","text":"حبا"}],"content":"ignored"}"#,
        )
        .unwrap();
        assert_eq!(msg.text(), "مرحبا");
    }

    #[test]
    fn incoming_falls_back_to_content() {
        let msg: IncomingMessage = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(msg.text(), "hello");

        let empty: IncomingMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn ui_message_serializes_camel_case() {
        let msg = UiMessage::new(Role::Assistant, "hi").with_model("DeepSeek");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["parts"][0]["type"], "text");
        assert_eq!(value["model"], "DeepSeek");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn last_user_text_skips_trailing_assistant() {
        let messages = vec![
            Message::system("sys"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::assistant("dangling"),
        ];
        assert_eq!(last_user_text(&messages), Some("second"));
        assert_eq!(last_user_text(&[Message::system("only")]), None);
    }

    #[test]
    fn token_estimate_counts_characters() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("مرحبا بك"), 2);
    }
}
