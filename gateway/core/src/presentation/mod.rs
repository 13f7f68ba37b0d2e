// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`tr5-gateway-core`)
//!
//! HTTP surface that translates browser requests into application service
//! calls. No business logic lives here.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP/SSE (Axum) | Chat, memory, training and health endpoints plus simulated streaming |
//! | [`error`] | HTTP | JSON error bodies for handler failures |

pub mod api;
pub mod error;
