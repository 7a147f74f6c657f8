// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging channels.
//!
//! [`GraphSendChannel`] posts to the platform's send API. [`LogChannel`] only
//! logs, for dry runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nudge_config::model::ChannelConfig;
use nudge_core::{AdapterType, MessagingChannel, NudgeError, PluginAdapter, SenderId};
use serde::Serialize;
use tracing::{debug, info};

/// Longest slice of an error body carried into a delivery error.
const ERROR_BODY_LIMIT: usize = 200;

/// Build the channel selected by config.
pub fn build_channel(config: &ChannelConfig) -> Result<Arc<dyn MessagingChannel>, NudgeError> {
    if config.dry_run {
        info!("channel dry run enabled, outbound messages will only be logged");
        return Ok(Arc::new(LogChannel));
    }
    Ok(Arc::new(GraphSendChannel::new(config)?))
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipient: Recipient<'a>,
    message: OutboundText<'a>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct OutboundText<'a> {
    text: &'a str,
}

/// Delivers text through the platform send API.
#[derive(Debug, Clone)]
pub struct GraphSendChannel {
    client: reqwest::Client,
    send_url: String,
    access_token: String,
}

impl GraphSendChannel {
    pub fn new(config: &ChannelConfig) -> Result<Self, NudgeError> {
        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                NudgeError::Config(
                    "channel.access_token is required unless channel.dry_run is set".into(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NudgeError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            send_url: config.send_url.clone(),
            access_token,
        })
    }
}

impl PluginAdapter for GraphSendChannel {
    fn name(&self) -> &str {
        "graph-send"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }
}

#[async_trait]
impl MessagingChannel for GraphSendChannel {
    async fn deliver(&self, recipient: &SenderId, text: &str) -> Result<(), NudgeError> {
        let failed = |message: String| NudgeError::Delivery {
            recipient: recipient.to_string(),
            message,
        };

        let body = SendRequest {
            recipient: Recipient {
                id: recipient.as_str(),
            },
            message: OutboundText { text },
        };

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(format!("send request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let mut detail = response.text().await.unwrap_or_default();
            if detail.len() > ERROR_BODY_LIMIT {
                let mut end = ERROR_BODY_LIMIT;
                while !detail.is_char_boundary(end) {
                    end -= 1;
                }
                detail.truncate(end);
            }
            return Err(failed(format!("HTTP {status}: {detail}")));
        }

        debug!(recipient = %recipient, chars = text.chars().count(), "message delivered");
        Ok(())
    }
}

/// Logs outbound messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

impl PluginAdapter for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }
}

#[async_trait]
impl MessagingChannel for LogChannel {
    async fn deliver(&self, recipient: &SenderId, text: &str) -> Result<(), NudgeError> {
        info!(recipient = %recipient, text, "dry run: message not sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ChannelConfig {
        ChannelConfig {
            send_url: format!("{}/me/messages", server.uri()),
            access_token: Some("page-token".into()),
            timeout_secs: 2,
            ..ChannelConfig::default()
        }
    }

    #[tokio::test]
    async fn posts_recipient_and_text_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(header("authorization", "Bearer page-token"))
            .and(body_json(serde_json::json!({
                "recipient": {"id": "alice"},
                "message": {"text": "Hi Alice!"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "alice",
                "message_id": "m_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = GraphSendChannel::new(&config_for(&server)).unwrap();
        channel.deliver(&"alice".into(), "Hi Alice!").await.unwrap();
    }

    #[tokio::test]
    async fn error_status_becomes_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("recipient not found"))
            .mount(&server)
            .await;

        let channel = GraphSendChannel::new(&config_for(&server)).unwrap();
        let err = channel.deliver(&"ghost".into(), "hello").await.unwrap_err();
        match err {
            NudgeError::Delivery { recipient, message } => {
                assert_eq!(recipient, "ghost");
                assert!(message.contains("400"));
                assert!(message.contains("recipient not found"));
            }
            other => panic!("expected Delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_delivery_error() {
        let config = ChannelConfig {
            send_url: "http://127.0.0.1:9/me/messages".into(),
            access_token: Some("page-token".into()),
            timeout_secs: 1,
            ..ChannelConfig::default()
        };
        let channel = GraphSendChannel::new(&config).unwrap();
        let err = channel.deliver(&"alice".into(), "hello").await.unwrap_err();
        assert!(matches!(err, NudgeError::Delivery { .. }));
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = GraphSendChannel::new(&ChannelConfig::default()).unwrap_err();
        assert!(matches!(err, NudgeError::Config(_)));
    }

    #[test]
    fn dry_run_selects_log_channel() {
        let channel = build_channel(&ChannelConfig {
            dry_run: true,
            ..ChannelConfig::default()
        })
        .unwrap();
        assert_eq!(channel.name(), "log");
    }
}
