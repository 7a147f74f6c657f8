// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook, health, metrics and admin routes.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use nudge_core::{EventKind, HealthStatus, InboundEvent, ModeFlag, NudgeError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::SendError;
use tracing::{debug, info, warn};

use crate::server::GatewayState;

/// How long a webhook waits for room in the agent queue before giving up.
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of `POST /webhook`.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
    /// Platform timestamp; receipt time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WebhookRequest {
    /// Validate the request and turn it into an event.
    ///
    /// `scheduled_trigger` is produced internally by the follow-up queue and
    /// is refused from the outside.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<InboundEvent, NudgeError> {
        let sender = self
            .sender_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| NudgeError::InvalidEvent("sender_id is required".into()))?;
        let kind = self
            .kind
            .ok_or_else(|| NudgeError::InvalidEvent("kind is required".into()))?;
        let kind = EventKind::from_str(&kind)
            .map_err(|_| NudgeError::InvalidEvent(format!("unknown event kind '{kind}'")))?;
        let at = self.timestamp.unwrap_or(received_at);

        match kind {
            EventKind::Message => Ok(InboundEvent::message(
                sender,
                self.text.unwrap_or_default(),
                at,
            )),
            EventKind::AdClick => Ok(InboundEvent::ad_click(sender, self.payload, at)),
            EventKind::ScheduledTrigger => Err(NudgeError::InvalidEvent(
                "scheduled_trigger events cannot be submitted".into(),
            )),
        }
    }
}

/// Body of a `202 Accepted` webhook response.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: String,
}

/// Query string of the subscription handshake.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub mode: ModeFlag,
    pub adapters: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: ModeFlag,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: ModeFlag,
    pub changed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ModeFlag>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// POST /webhook
///
/// Validates the event, hands it to the agent loop and acknowledges at once.
pub async fn post_webhook(
    State(state): State<GatewayState>,
    body: Result<Json<WebhookRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection, "webhook body rejected");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let event = match body.into_event(Utc::now()) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "invalid webhook event");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let id = event.id.clone();
    let sender = event.sender.clone();
    let kind = event.kind;

    match tokio::time::timeout(ENQUEUE_TIMEOUT, state.inbound_tx.send(event)).await {
        Ok(Ok(())) => {
            debug!(event_id = %id, sender = %sender, %kind, "webhook event accepted");
            (StatusCode::ACCEPTED, Json(AcceptedResponse { id })).into_response()
        }
        Ok(Err(SendError(_))) => {
            warn!(event_id = %id, "agent loop not accepting events");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "agent loop not accepting events",
            )
        }
        Err(_) => {
            warn!(event_id = %id, "inbound queue full, event refused");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "inbound queue full")
        }
    }
}

/// GET /webhook
///
/// Platform subscription handshake: echo the challenge when the token matches.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let token_matches = match (state.verify_token.as_deref(), params.verify_token.as_deref()) {
        (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
        _ => false,
    };

    match (params.mode.as_deref(), params.challenge) {
        (Some("subscribe"), Some(challenge)) if token_matches => {
            info!("webhook subscription verified");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                challenge,
            )
                .into_response()
        }
        _ => {
            warn!("webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// GET /health
///
/// Polls every registered adapter. Any unhealthy adapter turns the response into a 503.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let mut adapters = BTreeMap::new();
    let mut degraded = false;
    let mut unhealthy = false;

    for adapter in &state.health.adapters {
        let status = match adapter.health_check().await {
            Ok(status) => status,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };
        let label = match status {
            HealthStatus::Healthy => "healthy".to_string(),
            HealthStatus::Degraded(reason) => {
                degraded = true;
                format!("degraded: {reason}")
            }
            HealthStatus::Unhealthy(reason) => {
                unhealthy = true;
                format!("unhealthy: {reason}")
            }
        };
        adapters.insert(adapter.name().to_string(), label);
    }

    let (code, status) = if unhealthy {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else if degraded {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        mode: state.mode.current(),
        adapters,
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics exporter not enabled"),
    }
}

/// GET /admin/mode
pub async fn get_mode(State(state): State<GatewayState>) -> Json<ModeResponse> {
    let snapshot = state.mode.snapshot();
    Json(ModeResponse {
        mode: snapshot.mode,
        changed_at: snapshot.changed_at,
        previous: None,
    })
}

/// PUT /admin/mode
///
/// Takes effect for the next event routed; in-flight events keep the mode they read.
pub async fn put_mode(
    State(state): State<GatewayState>,
    body: Result<Json<ModeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let previous = state.mode.set(request.mode);
    let snapshot = state.mode.snapshot();
    info!(from = %previous, to = %snapshot.mode, "mode changed via admin endpoint");
    Json(ModeResponse {
        mode: snapshot.mode,
        changed_at: snapshot.changed_at,
        previous: Some(previous),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn request(json: &str) -> WebhookRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn message_request_becomes_message_event() {
        let event = request(r#"{"sender_id": "alice", "kind": "message", "text": "hi"}"#)
            .into_event(ts(100))
            .unwrap();
        assert_eq!(event.kind, EventKind::Message);
        assert_eq!(event.sender.as_str(), "alice");
        assert_eq!(event.text.as_deref(), Some("hi"));
        assert_eq!(event.timestamp, ts(100));
    }

    #[test]
    fn platform_timestamp_wins_over_receipt_time() {
        let event = request(
            r#"{"sender_id": "bob", "kind": "ad_click", "payload": "spring-promo",
                "timestamp": "2025-10-01T12:00:00Z"}"#,
        )
        .into_event(ts(100))
        .unwrap();
        assert_eq!(event.kind, EventKind::AdClick);
        assert_eq!(event.payload.as_deref(), Some("spring-promo"));
        assert_eq!(event.timestamp.to_rfc3339(), "2025-10-01T12:00:00+00:00");
    }

    #[test]
    fn unknown_or_missing_kind_is_invalid() {
        for body in [
            r#"{"sender_id": "alice", "kind": "story_reply"}"#,
            r#"{"sender_id": "alice"}"#,
        ] {
            let err = request(body).into_event(ts(0)).unwrap_err();
            assert!(matches!(err, NudgeError::InvalidEvent(_)), "{body}");
        }
    }

    #[test]
    fn blank_sender_is_invalid() {
        let err = request(r#"{"sender_id": "  ", "kind": "message"}"#)
            .into_event(ts(0))
            .unwrap_err();
        assert!(err.to_string().contains("sender_id"));
    }

    #[test]
    fn scheduled_trigger_is_internal_only() {
        let err = request(r#"{"sender_id": "alice", "kind": "scheduled_trigger"}"#)
            .into_event(ts(0))
            .unwrap_err();
        assert!(matches!(err, NudgeError::InvalidEvent(_)));
    }

    #[test]
    fn mode_response_omits_absent_previous() {
        let json = serde_json::to_string(&ModeResponse {
            mode: ModeFlag::AdsOnly,
            changed_at: ts(0),
            previous: None,
        })
        .unwrap();
        assert!(json.contains("\"mode\":\"ads_only\""));
        assert!(!json.contains("previous"));
    }
}
