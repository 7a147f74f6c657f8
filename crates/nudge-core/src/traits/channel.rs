// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send-side messaging channel trait.

use async_trait::async_trait;

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SenderId;

/// Delivers outbound text to a contact on the messaging platform.
///
/// A failed delivery is reported as [`NudgeError::Delivery`]; the engine
/// hands it to the follow-up queue's backoff path.
#[async_trait]
pub trait MessagingChannel: PluginAdapter {
    async fn deliver(&self, recipient: &SenderId, text: &str) -> Result<(), NudgeError>;
}
