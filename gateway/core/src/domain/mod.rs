// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Vendor-neutral types and the interfaces the application layer consumes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Messages, provider and memory contracts, gateway configuration

pub mod message;
pub mod llm;
pub mod memory;
pub mod gateway_config;
