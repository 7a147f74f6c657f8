// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decision layer of the Nudge engagement service.
//!
//! The [`ActionRouter`] turns an inbound event plus conversation state into an
//! [`Action`](nudge_core::Action). The [`ModeSwitch`] holds the process-wide
//! ads-only flag. Topic classification and the reply template pool live here too.

pub mod classifier;
pub mod mode;
pub mod router;
pub mod templates;

pub use classifier::{TopicClassification, TopicClassifier};
pub use mode::{ModeState, ModeSwitch};
pub use router::{ActionRouter, resolves_followup};
pub use templates::render;
