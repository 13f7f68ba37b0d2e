// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod fallback;
pub mod chat;
pub mod training;

// Re-export use cases for convenience
pub use fallback::{Completion, FallbackOrchestrator, FallbackPolicy, FALLBACK_PROVIDER};
pub use chat::{ChatError, ChatExchange, ChatRequest, ChatService, ChatSettings, MemoryMode};
pub use training::{SaveTrainingRequest, SavedTraining, TrainingService};
