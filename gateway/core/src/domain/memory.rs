// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Memory
//!
//! Interface to the remote platform that owns conversation history,
//! training data and the activity log.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Conversation memory contract consumed by application services

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{ConversationTurn, Message};

/// Activity log entry recorded after user-visible operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub user_id: i64,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<i64>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub status: String,
}

/// A piece of conversation content submitted for model training.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingData {
    pub user_id: i64,
    pub session_id: Option<i64>,
    pub data_name: String,
    pub data_type: String,
    pub content: String,
    /// Hex SHA-256 of `content`, used by the platform for de-duplication.
    pub content_hash: String,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Errors from the memory gateway. Callers treat all of them as best-effort
/// failures: they are logged and never reach the end user.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory platform is not configured")]
    NotConfigured,

    #[error("memory platform request failed: {0}")]
    Transport(String),

    #[error("memory platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected memory platform response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Prior messages of a conversation, oldest first, at most `limit`.
    async fn get_context(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, MemoryError>;

    /// Persist one user/assistant exchange.
    async fn save_turn(&self, turn: &ConversationTurn) -> Result<(), MemoryError>;

    async fn log_activity(&self, activity: &ActivityRecord) -> Result<(), MemoryError>;

    /// Upload training content; returns the platform-assigned id when known.
    async fn save_training_data(&self, data: &TrainingData) -> Result<Option<i64>, MemoryError>;

    /// Patterns the platform mined from a conversation.
    async fn extract_patterns(
        &self,
        user_id: i64,
        conversation_id: &str,
    ) -> Result<Vec<serde_json::Value>, MemoryError>;

    /// Whether a platform credential is present.
    fn is_configured(&self) -> bool;

    /// Base URL reported by health checks.
    fn platform_url(&self) -> &str;
}
