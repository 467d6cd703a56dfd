// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway exposing the plugin registry.
//!
//! The gateway is a thin adapter: every route maps onto one registry
//! operation and translates its error into a status code.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use handlers::{ApiError, status_for};
pub use server::{GatewayState, ServerConfig, router, start_server};
