// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod llm;
pub mod platform_client;

pub use platform_client::PlatformMemoryClient;
