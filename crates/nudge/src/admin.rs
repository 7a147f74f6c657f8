// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge mode` client for the admin endpoint of a running server.

use std::time::Duration;

use chrono::{DateTime, Utc};
use nudge_config::NudgeConfig;
use nudge_core::{ModeFlag, NudgeError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ModeView {
    pub mode: ModeFlag,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub previous: Option<ModeFlag>,
}

impl ModeView {
    pub fn describe(&self) -> String {
        match self.previous {
            Some(previous) if previous != self.mode => {
                format!("mode: {} (was {previous})", self.mode)
            }
            Some(_) => format!("mode: {} (unchanged)", self.mode),
            None => format!("mode: {} (since {})", self.mode, self.changed_at.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
struct SetMode {
    mode: ModeFlag,
}

pub struct AdminClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl AdminClient {
    pub fn new(config: &NudgeConfig, base_url: Option<&str>) -> Result<Self, NudgeError> {
        let token = config.gateway.admin_token.clone().ok_or_else(|| {
            NudgeError::Config("gateway.admin_token must be set to use `nudge mode`".into())
        })?;
        let base = base_url.map(str::to_string).unwrap_or_else(|| {
            format!("http://{}:{}", config.gateway.host, config.gateway.port)
        });
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NudgeError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url: format!("{}/admin/mode", base.trim_end_matches('/')),
            token,
        })
    }

    pub async fn get_mode(&self) -> Result<ModeView, NudgeError> {
        let request = self.client.get(&self.url);
        self.send(request).await
    }

    pub async fn set_mode(&self, mode: ModeFlag) -> Result<ModeView, NudgeError> {
        let request = self.client.put(&self.url).json(&SetMode { mode });
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ModeView, NudgeError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| NudgeError::Channel {
                message: format!("admin endpoint unreachable at {}: {e}", self.url),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NudgeError::Channel {
                message: format!("admin endpoint answered HTTP {status}"),
                source: None,
            });
        }
        response.json().await.map_err(|e| NudgeError::Channel {
            message: format!("unexpected admin response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}
