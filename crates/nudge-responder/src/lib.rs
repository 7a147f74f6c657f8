// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI reply generation for the Nudge engagement service.
//!
//! [`AiResponder`] wraps any [`AiBackend`](nudge_core::AiBackend) with a
//! [`RetryPolicy`] and falls back to a placeholder reply when the backend stays
//! unavailable. [`AnthropicBackend`] talks to the Anthropic Messages API.

pub mod client;
pub mod policy;
pub mod responder;
pub mod types;

pub use client::AnthropicBackend;
pub use policy::RetryPolicy;
pub use responder::{AiResponder, Reply};
