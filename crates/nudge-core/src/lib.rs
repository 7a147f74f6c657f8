// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Nudge engagement service.
//!
//! This crate provides the domain types (events, conversation state, actions,
//! follow-ups), the error taxonomy, and the adapter traits the engine talks to.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AiFailure, NudgeError};
pub use types::{
    Action, AdapterType, ConversationState, DeliveryStatus, EventKind, FollowupEntry,
    FollowupKey, FollowupPayload, FollowupSlot, HealthStatus, HistoryEntry, InboundEvent, ModeFlag,
    ReplySource, SenderId, TemplateId, TemplateKind, TopicTag,
};

pub use traits::{AiBackend, ConversationStore, MessagingChannel, PluginAdapter};
