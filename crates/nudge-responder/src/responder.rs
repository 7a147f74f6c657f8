// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-retry wrapper around an [`AiBackend`].
//!
//! `try_generate` surfaces exhaustion as [`NudgeError::AiUnavailable`];
//! `generate` never fails and substitutes the placeholder reply instead.

use std::sync::Arc;

use nudge_core::{AiBackend, AiFailure, NudgeError, ReplySource};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::policy::RetryPolicy;

/// Text to send plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
    /// Backend calls made, including the successful one.
    pub attempts: u32,
}

pub struct AiResponder {
    backend: Arc<dyn AiBackend>,
    policy: RetryPolicy,
}

impl AiResponder {
    pub fn new(backend: Arc<dyn AiBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &Arc<dyn AiBackend> {
        &self.backend
    }

    /// Ask the backend for a reply, retrying transient failures.
    pub async fn try_generate(&self, prompt: &str) -> Result<String, NudgeError> {
        self.attempt(prompt).await.map(|(text, _)| text)
    }

    /// Ask the backend for a reply, or fall back to the placeholder.
    pub async fn generate(&self, prompt: &str) -> Reply {
        let reply = match self.attempt(prompt).await {
            Ok((text, attempts)) => Reply {
                text,
                source: ReplySource::Ai,
                attempts,
            },
            Err(err) => {
                let attempts = match &err {
                    NudgeError::AiUnavailable { attempts, .. } => *attempts,
                    _ => self.policy.max_attempts,
                };
                warn!(
                    backend = self.backend.name(),
                    attempts,
                    error = %err,
                    "AI backend unavailable, sending placeholder reply"
                );
                Reply {
                    text: self.policy.placeholder.clone(),
                    source: ReplySource::Placeholder,
                    attempts,
                }
            }
        };
        metrics::counter!("nudge_replies_total", "source" => reply.source.to_string()).increment(1);
        reply
    }

    async fn attempt(&self, prompt: &str) -> Result<(String, u32), NudgeError> {
        let max_attempts = self.policy.max_attempts;
        let mut last_failure: Option<AiFailure> = None;
        let mut made = 0;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            made = attempt;
            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(self.policy.attempt_timeout, self.backend.complete(prompt))
                    .await
                {
                    Ok(Ok(text)) if text.trim().is_empty() => {
                        Err(AiFailure::Malformed("empty reply".into()))
                    }
                    Ok(result) => result,
                    Err(_) => Err(AiFailure::Timeout(self.policy.attempt_timeout)),
                };
            metrics::histogram!("nudge_ai_latency_seconds").record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(text) => {
                    debug!(attempt, "AI reply generated");
                    return Ok((text, attempt));
                }
                Err(failure) => {
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        max_attempts,
                        error = %failure,
                        "AI attempt failed"
                    );
                    let transient = failure.is_transient();
                    last_failure = Some(failure);
                    if !transient {
                        break;
                    }
                }
            }
        }

        Err(NudgeError::AiUnavailable {
            attempts: made,
            reason: last_failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no attempts allowed".to_string()),
        })
    }
}
