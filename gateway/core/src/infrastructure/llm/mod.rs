// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates the domain `ChatProvider` interface into a
// vendor's HTTP API. OpenAI, Groq and DeepSeek share one wire format.

pub mod openai_compatible;
pub mod huggingface;
pub mod registry;

pub use registry::ProviderRegistry;
