// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Nudge engagement service.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across adapter traits and core operations.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Conversation store errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The messaging channel rejected or failed to accept an outbound message.
    #[error("delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    /// The AI backend could not produce a reply within the retry budget.
    #[error("AI backend unavailable after {attempts} attempt(s): {reason}")]
    AiUnavailable { attempts: u32, reason: String },

    /// Malformed inbound payload, rejected at the boundary.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Channel plumbing errors (bind failure, closed queues).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI provider construction or transport errors.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NudgeError {
    /// Wraps any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }
}

/// Why a single call to the AI backend failed.
///
/// The responder retries transient failures and gives up immediately on the rest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiFailure {
    /// The attempt exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The backend answered, but not with a usable reply.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend is overloaded, erroring, or unreachable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the request (bad credentials, invalid request).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl AiFailure {
    /// Returns true for failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, AiFailure::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rejections_are_permanent() {
        assert!(AiFailure::Timeout(Duration::from_secs(1)).is_transient());
        assert!(AiFailure::RateLimited("slow down".into()).is_transient());
        assert!(AiFailure::Malformed("no text".into()).is_transient());
        assert!(AiFailure::Unavailable("503".into()).is_transient());
        assert!(!AiFailure::Rejected("401".into()).is_transient());
    }

    #[test]
    fn error_messages_carry_context() {
        let err = NudgeError::AiUnavailable {
            attempts: 3,
            reason: "rate limited: 429".into(),
        };
        assert_eq!(
            err.to_string(),
            "AI backend unavailable after 3 attempt(s): rate limited: 429"
        );

        let err = NudgeError::Delivery {
            recipient: "alice".into(),
            message: "HTTP 500".into(),
        };
        assert!(err.to_string().contains("alice"));
    }
}
