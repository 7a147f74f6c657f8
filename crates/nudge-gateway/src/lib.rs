// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook gateway and outbound channels.
//!
//! The gateway validates inbound platform events, acknowledges them with a
//! `202`, and hands them to the agent loop over a bounded channel. It also
//! serves health, metrics, and the admin mode endpoint. Replies leave through
//! a [`MessagingChannel`](nudge_core::MessagingChannel) from [`channel`].

pub mod auth;
pub mod channel;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use channel::{GraphSendChannel, LogChannel, build_channel};
pub use server::{GatewayState, HealthState, MetricsRender, build_router, start_server};
