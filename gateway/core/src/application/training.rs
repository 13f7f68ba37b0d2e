// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Training
//!
//! Submits conversation content to the platform as training data.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use super::chat::{log_memory_failure, ChatError};
use crate::domain::memory::{ConversationMemory, MemoryError, TrainingData};
use crate::domain::message::estimate_tokens;

pub const TRAINING_SAVED_MESSAGE: &str = "تم حفظ بيانات التدريب بنجاح";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTrainingRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub data_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub session_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTraining {
    pub success: bool,
    pub data_id: Option<i64>,
    pub message: String,
}

pub struct TrainingService {
    memory: Arc<dyn ConversationMemory>,
}

impl TrainingService {
    pub fn new(memory: Arc<dyn ConversationMemory>) -> Self {
        Self { memory }
    }

    pub async fn save(&self, request: SaveTrainingRequest) -> Result<SavedTraining, ChatError> {
        let content = request
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ChatError::Validation("No content provided".into()))?;

        let now = Utc::now();
        let data = TrainingData {
            user_id: request.user_id.unwrap_or(1),
            session_id: request.session_id,
            data_name: request
                .data_name
                .unwrap_or_else(|| format!("Training_{}", now.format("%Y%m%d_%H%M%S"))),
            data_type: request.data_type.unwrap_or_else(|| "conversation".to_string()),
            content_hash: content_hash(&content),
            token_count: estimate_tokens(&content),
            content,
            created_at: now,
        };

        let data_id = match self.memory.save_training_data(&data).await {
            Ok(id) => id,
            Err(e) => {
                log_memory_failure("save_training_data", &e);
                if !matches!(e, MemoryError::NotConfigured) {
                    metrics::counter!("tr5_training_upload_failures_total").increment(1);
                }
                None
            }
        };

        info!(data_name = %data.data_name, tokens = data.token_count, data_id = ?data_id, "Training data submitted");

        Ok(SavedTraining {
            success: true,
            data_id,
            message: TRAINING_SAVED_MESSAGE.to_string(),
        })
    }
}

/// Lowercase hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
