// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Platform Memory Client
//!
//! HTTP client for the remote training platform that stores conversation
//! memory, training data and activity logs.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Implements `ConversationMemory` over the platform REST API
//! - **Integration:** Chat services → `POST {platform}/api/{endpoint}` (bearer auth)
//!
//! Every call returns `MemoryError::NotConfigured` without touching the
//! network when no platform key is set.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::domain::gateway_config::MemoryConfig;
use crate::domain::memory::{ActivityRecord, ConversationMemory, MemoryError, TrainingData};
use crate::domain::message::{estimate_tokens, ConversationTurn, Message, Role};

const SOURCE: &str = "chat_interface";

pub struct PlatformMemoryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// One stored message as the platform expects it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryRecord<'a> {
    user_id: i64,
    session_id: Option<i64>,
    conversation_id: &'a str,
    role: Role,
    content: &'a str,
    token_count: usize,
    metadata: RecordMetadata,
}

#[derive(Debug, Serialize)]
struct RecordMetadata {
    timestamp: String,
    source: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextQuery<'a> {
    conversation_id: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ContextResponse {
    #[serde(default)]
    messages: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrainingUpload<'a> {
    user_id: i64,
    session_id: Option<i64>,
    data_name: &'a str,
    data_type: &'a str,
    content: &'a str,
    content_hash: &'a str,
    token_count: usize,
    metadata: RecordMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatternQuery<'a> {
    user_id: i64,
    conversation_id: &'a str,
}

impl PlatformMemoryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn from_config(config: &MemoryConfig) -> anyhow::Result<Self> {
        Self::new(config.platform_url.clone(), config.resolved_api_key(), config.timeout)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<serde_json::Value, MemoryError> {
        let api_key = self.api_key.as_deref().ok_or(MemoryError::NotConfigured)?;
        let url = format!("{}/api/{}", self.base_url.trim_end_matches('/'), endpoint);

        debug!(url = %url, "platform request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(MemoryError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| MemoryError::Decode(e.to_string()))
    }

    fn metadata() -> RecordMetadata {
        RecordMetadata {
            timestamp: Utc::now().to_rfc3339(),
            source: SOURCE,
        }
    }
}

#[async_trait]
impl ConversationMemory for PlatformMemoryClient {
    async fn get_context(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, MemoryError> {
        let value = self
            .post("memory/context", &ContextQuery { conversation_id, limit })
            .await?;

        let response: ContextResponse = if value.is_null() {
            ContextResponse { messages: vec![] }
        } else {
            serde_json::from_value(value).map_err(|e| MemoryError::Decode(e.to_string()))?
        };

        let messages: Vec<Message> = response
            .messages
            .into_iter()
            .filter_map(|entry| {
                let role = match entry.role.as_deref() {
                    None => Role::User,
                    Some(raw) => Role::from_str(raw).ok()?,
                };
                Some(Message {
                    role,
                    content: entry.content.unwrap_or_default(),
                })
            })
            .collect();

        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn save_turn(&self, turn: &ConversationTurn) -> Result<(), MemoryError> {
        let records = [
            MemoryRecord {
                user_id: turn.user_id,
                session_id: turn.session_id,
                conversation_id: &turn.conversation_id,
                role: Role::User,
                content: &turn.user_message,
                token_count: estimate_tokens(&turn.user_message),
                metadata: Self::metadata(),
            },
            MemoryRecord {
                user_id: turn.user_id,
                session_id: turn.session_id,
                conversation_id: &turn.conversation_id,
                role: Role::Assistant,
                content: &turn.assistant_message,
                token_count: estimate_tokens(&turn.assistant_message),
                metadata: Self::metadata(),
            },
        ];

        self.post("memory/save", &records[..]).await?;
        Ok(())
    }

    async fn log_activity(&self, activity: &ActivityRecord) -> Result<(), MemoryError> {
        self.post("activity/log", activity).await?;
        Ok(())
    }

    async fn save_training_data(&self, data: &TrainingData) -> Result<Option<i64>, MemoryError> {
        let upload = TrainingUpload {
            user_id: data.user_id,
            session_id: data.session_id,
            data_name: &data.data_name,
            data_type: &data.data_type,
            content: &data.content,
            content_hash: &data.content_hash,
            token_count: data.token_count,
            metadata: RecordMetadata {
                timestamp: data.created_at.to_rfc3339(),
                source: SOURCE,
            },
        };

        let value = self.post("data/upload", &upload).await?;
        Ok(value.get("id").and_then(|id| id.as_i64()))
    }

    async fn extract_patterns(
        &self,
        user_id: i64,
        conversation_id: &str,
    ) -> Result<Vec<serde_json::Value>, MemoryError> {
        let value = self
            .post("memory/patterns", &PatternQuery { user_id, conversation_id })
            .await?;

        Ok(value
            .get("patterns")
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn platform_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(url: String) -> PlatformMemoryClient {
        PlatformMemoryClient::new(url, Some("plat-key".to_string()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn context_is_parsed_and_bounded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/memory/context")
            .match_header("authorization", "Bearer plat-key")
            .match_body(Matcher::Json(json!({ "conversationId": "conv-1", "limit": 2 })))
            .with_status(200)
            .with_body(
                json!({
                    "messages": [
                        { "role": "user", "content": "oldest" },
                        { "role": "tool", "content": "dropped" },
                        { "role": "assistant", "content": "middle" },
                        { "content": "newest" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let context = client(server.url()).get_context("conv-1", 2).await.unwrap();

        assert_eq!(context, vec![Message::assistant("middle"), Message::user("newest")]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn save_turn_posts_both_records() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/memory/save")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"^\[\{"userId":7,"sessionId":null,"conversationId":"conv-1","role":"user","content":"abcdefgh","tokenCount":2,"#.to_string()),
                Matcher::Regex(r#"\},\{"userId":7,"sessionId":null,"conversationId":"conv-1","role":"assistant","content":"reply","tokenCount":1,"#.to_string()),
                Matcher::Regex(r#""source":"chat_interface""#.to_string()),
            ]))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let turn = ConversationTurn {
            conversation_id: "conv-1".to_string(),
            user_id: 7,
            session_id: None,
            user_message: "abcdefgh".to_string(),
            assistant_message: "reply".to_string(),
            timestamp: Utc::now(),
        };
        client(server.url()).save_turn(&turn).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/activity/log")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let activity = ActivityRecord {
            user_id: 1,
            action: "chat_interaction".to_string(),
            resource_type: Some("conversation".to_string()),
            resource_id: None,
            details: json!({}),
            status: "success".to_string(),
        };
        let err = client(server.url()).log_activity(&activity).await.unwrap_err();
        assert!(matches!(err, MemoryError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn training_upload_returns_platform_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/data/upload")
            .match_body(Matcher::PartialJson(json!({ "dataName": "sample", "contentHash": "abc" })))
            .with_status(200)
            .with_body(r#"{"id": 42}"#)
            .create_async()
            .await;

        let data = TrainingData {
            user_id: 1,
            session_id: Some(3),
            data_name: "sample".to_string(),
            data_type: "conversation".to_string(),
            content: "content".to_string(),
            content_hash: "abc".to_string(),
            token_count: 1,
            created_at: Utc::now(),
        };
        let id = client(server.url()).save_training_data(&data).await.unwrap();
        assert_eq!(id, Some(42));
    }

    #[tokio::test]
    async fn patterns_default_to_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/memory/patterns")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let patterns = client(server.url()).extract_patterns(1, "conv-1").await.unwrap();
        assert!(patterns.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_client_never_calls_out() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let client = PlatformMemoryClient::new(server.url(), None, Duration::from_secs(5)).unwrap();
        assert!(!client.is_configured());
        let err = client.get_context("conv-1", 5).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotConfigured));
        mock.assert_async().await;
    }
}
