// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0
//! TR5 gateway core
//!
//! Multi-provider chat completion with sequential fallback, best-effort
//! conversation memory on a remote platform, and the HTTP surface that
//! ties them together.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, application services, vendor adapters and routes

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
