// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the TR5 CLI

pub mod ask;
pub mod config;
pub mod health;
pub mod serve;

pub use self::ask::AskArgs;
pub use self::config::ConfigCommand;
