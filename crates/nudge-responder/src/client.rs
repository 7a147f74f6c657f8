// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`AiBackend`] over the Anthropic Messages API.
//!
//! One HTTP call per `complete`; retry and fallback belong to the responder.

use std::time::Duration;

use async_trait::async_trait;
use nudge_config::model::ResponderConfig;
use nudge_core::{AdapterType, AiBackend, AiFailure, NudgeError, PluginAdapter};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, ApiMessage, MessageRequest, MessageResponse};

/// HTTP client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: reqwest::Client,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    base_url: String,
    timeout: Duration,
}

impl AnthropicBackend {
    /// Build a backend from config.
    ///
    /// The API key comes from `responder.api_key`, else `ANTHROPIC_API_KEY`.
    pub fn new(config: &ResponderConfig) -> Result<Self, NudgeError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                NudgeError::Config(
                    "no Anthropic API key: set responder.api_key or ANTHROPIC_API_KEY".into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| NudgeError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&config.api_version).map_err(|e| {
                NudgeError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let timeout = Duration::from_secs(config.attempt_timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| NudgeError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            base_url: config.base_url.clone(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &str) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            system: (!self.system_prompt.is_empty()).then(|| self.system_prompt.clone()),
            max_tokens: self.max_tokens,
        }
    }
}

impl PluginAdapter for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }
}

#[async_trait]
impl AiBackend for AnthropicBackend {
    async fn complete(&self, prompt: &str) -> Result<String, AiFailure> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiFailure::Timeout(self.timeout)
                } else {
                    AiFailure::Unavailable(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "completion response received");

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AiFailure::Timeout(self.timeout)
            } else {
                AiFailure::Unavailable(format!("failed to read response body: {e}"))
            }
        })?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let parsed: MessageResponse = serde_json::from_str(&body)
            .map_err(|e| AiFailure::Malformed(format!("failed to parse API response: {e}")))?;
        parsed
            .text()
            .ok_or_else(|| AiFailure::Malformed(format!("response {} has no text", parsed.id)))
    }
}

/// Map a non-2xx status to a failure class.
fn classify_status(status: StatusCode, body: &str) -> AiFailure {
    let detail = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error {status} ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    };
    match status.as_u16() {
        429 => AiFailure::RateLimited(detail),
        500..=599 => AiFailure::Unavailable(detail),
        _ => AiFailure::Rejected(detail),
    }
}
