// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI backend trait for language-model integrations.

use async_trait::async_trait;

use crate::error::AiFailure;
use crate::traits::adapter::PluginAdapter;

/// A single-shot text generation backend.
///
/// Implementations make exactly one attempt per call and classify the failure;
/// retry, timeouts, and fallback live in the responder that wraps them.
#[async_trait]
pub trait AiBackend: PluginAdapter {
    async fn complete(&self, prompt: &str) -> Result<String, AiFailure>;
}
