// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero retry budgets and sane backoff bounds.

use crate::diagnostic::ConfigError;
use crate::model::{NudgeConfig, StorageBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &NudgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.agent.max_in_flight == 0 {
        invalid("agent.max_in_flight must be at least 1".to_string());
    }

    if config.responder.max_attempts == 0 {
        invalid("responder.max_attempts must be at least 1".to_string());
    }

    let multiplier = config.responder.backoff_multiplier;
    if multiplier.is_nan() || multiplier < 1.0 {
        invalid(format!(
            "responder.backoff_multiplier must be >= 1.0, got {multiplier}"
        ));
    }

    if config.responder.max_backoff_ms < config.responder.initial_backoff_ms {
        invalid(format!(
            "responder.max_backoff_ms ({}) must not be below responder.initial_backoff_ms ({})",
            config.responder.max_backoff_ms, config.responder.initial_backoff_ms
        ));
    }

    if config.responder.attempt_timeout_secs == 0 {
        invalid("responder.attempt_timeout_secs must be at least 1".to_string());
    }

    if config.responder.placeholder_reply.trim().is_empty() {
        invalid("responder.placeholder_reply must not be empty".to_string());
    }

    if config.followup.max_attempts == 0 {
        invalid("followup.max_attempts must be at least 1".to_string());
    }

    if config.followup.retry_max_secs < config.followup.retry_base_secs {
        invalid(format!(
            "followup.retry_max_secs ({}) must not be below followup.retry_base_secs ({})",
            config.followup.retry_max_secs, config.followup.retry_base_secs
        ));
    }

    if config.followup.sweep_interval_secs == 0 {
        invalid("followup.sweep_interval_secs must be at least 1".to_string());
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        invalid("storage.database_path must not be empty for the sqlite backend".to_string());
    }

    if config.gateway.host.trim().is_empty() {
        invalid("gateway.host must not be empty".to_string());
    }

    if config.gateway.inbound_buffer == 0 {
        invalid("gateway.inbound_buffer must be at least 1".to_string());
    }

    if !config.channel.dry_run && config.channel.send_url.trim().is_empty() {
        invalid("channel.send_url must not be empty unless channel.dry_run is set".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
