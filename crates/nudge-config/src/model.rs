// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Nudge engagement service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Nudge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    /// Service identity and worker settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Start-up operating mode.
    #[serde(default)]
    pub mode: ModeConfig,

    /// Action router policy.
    #[serde(default)]
    pub router: RouterConfig,

    /// AI responder backend and retry policy.
    #[serde(default)]
    pub responder: ResponderConfig,

    /// Follow-up queue retry and sweep settings.
    #[serde(default)]
    pub followup: FollowupConfig,

    /// Conversation store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Webhook gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Outbound messaging channel settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Prometheus metrics exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the service.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of events processed concurrently (across all senders).
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Seconds to wait for in-flight events on shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            max_in_flight: default_max_in_flight(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_agent_name() -> String {
    "nudge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_in_flight() -> usize {
    32
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Operating mode at process start. Changed later only through the admin endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModeConfig {
    /// Start in ads-only mode (templated replies, no AI calls).
    #[serde(default)]
    pub ads_only: bool,
}

/// Action router policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Delay before the follow-up scheduled by an ad click in normal mode.
    #[serde(default = "default_followup_delay_secs")]
    pub followup_delay_secs: u64,

    /// Delay before the follow-up scheduled by an ad click in ads-only mode.
    #[serde(default = "default_ads_followup_delay_secs")]
    pub ads_followup_delay_secs: u64,

    /// Silence after which a due follow-up gets a template instead of an AI reply.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Number of prior replies included in AI prompts.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            followup_delay_secs: default_followup_delay_secs(),
            ads_followup_delay_secs: default_ads_followup_delay_secs(),
            stale_after_secs: default_stale_after_secs(),
            history_window: default_history_window(),
        }
    }
}

fn default_followup_delay_secs() -> u64 {
    24 * 60 * 60
}

fn default_ads_followup_delay_secs() -> u64 {
    60 * 60
}

fn default_stale_after_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_history_window() -> usize {
    6
}

/// AI responder backend and retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    /// Anthropic API key. `None` falls back to the `ANTHROPIC_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Messages API endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Anthropic API version header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Maximum tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System prompt framing every generated reply.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Total attempts per reply, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before the second attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor between consecutive waits.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on a single wait.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Deadline for a single attempt.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Text sent when the backend stays unavailable.
    #[serde(default = "default_placeholder_reply")]
    pub placeholder_reply: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            placeholder_reply: default_placeholder_reply(),
        }
    }
}

fn default_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_system_prompt() -> String {
    "You are a friendly fitness and nutrition coach replying to direct messages. \
     Keep replies short (1-3 sentences), warm, and specific. Never give medical advice."
        .to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_attempt_timeout_secs() -> u64 {
    20
}

fn default_placeholder_reply() -> String {
    "Thanks for your message! Coach will get back to you personally very soon.".to_string()
}

/// Follow-up queue retry and sweep settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FollowupConfig {
    /// Delivery attempts before a follow-up is dropped and reported.
    #[serde(default = "default_followup_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first redelivery; doubles per further failure.
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Upper bound on the redelivery delay.
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,

    /// How often the sweeper looks for due follow-ups.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_followup_max_attempts(),
            retry_base_secs: default_retry_base_secs(),
            retry_max_secs: default_retry_max_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_followup_max_attempts() -> u32 {
    5
}

fn default_retry_base_secs() -> u64 {
    30
}

fn default_retry_max_secs() -> u64 {
    60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    15
}

/// Which conversation store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local store; state is lost on restart.
    Memory,
    /// SQLite file at `database_path`.
    #[default]
    Sqlite,
}

/// Conversation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("nudge").join("nudge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("nudge.db"))
        .display()
        .to_string()
}

/// Webhook gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Token the platform echoes during webhook subscription. `None` rejects the handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// Bearer token for `/admin` routes. `None` disables them (fail-closed).
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Capacity of the queue between webhook and agent loop.
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verify_token: None,
            admin_token: None,
            inbound_buffer: default_inbound_buffer(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3080
}

fn default_inbound_buffer() -> usize {
    1024
}

/// Outbound messaging channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Log outbound messages instead of sending them.
    #[serde(default)]
    pub dry_run: bool,

    /// Send-API endpoint.
    #[serde(default = "default_send_url")]
    pub send_url: String,

    /// Page access token for the send API.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_channel_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            send_url: default_send_url(),
            access_token: None,
            timeout_secs: default_channel_timeout_secs(),
        }
    }
}

fn default_send_url() -> String {
    "https://graph.facebook.com/v19.0/me/messages".to_string()
}

fn default_channel_timeout_secs() -> u64 {
    10
}

/// Prometheus metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the exporter and serve `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = NudgeConfig::default();
        assert!(!config.mode.ads_only);
        assert_eq!(config.responder.max_attempts, 3);
        assert_eq!(config.router.followup_delay_secs, 86_400);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.gateway.admin_token.is_none());
    }

    #[test]
    fn storage_backend_uses_snake_case() {
        let config: StorageConfig = toml::from_str("backend = \"memory\"").unwrap();
        assert_eq!(config.backend, StorageBackend::Memory);
        assert!(toml::from_str::<StorageConfig>("backend = \"redis\"").is_err());
    }
}
