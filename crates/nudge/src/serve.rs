// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge serve` command implementation.
//!
//! Wires the conversation store, AI responder, outbound channel, follow-up
//! queue and mode switch into an engine, then runs the webhook gateway, the
//! agent loop and the follow-up sweeper until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use nudge_agent::{AgentLoop, Engine, Sweeper, recording, shutdown};
use nudge_config::NudgeConfig;
use nudge_core::{ModeFlag, NudgeError, PluginAdapter};
use nudge_followup::{FollowupQueue, RetrySchedule};
use nudge_gateway::{AuthConfig, GatewayState, HealthState, MetricsRender};
use nudge_responder::{AiResponder, AnthropicBackend, RetryPolicy};
use nudge_router::ModeSwitch;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Runs the `nudge serve` command.
pub async fn run_serve(mut config: NudgeConfig, ads_only: bool) -> Result<(), NudgeError> {
    init_tracing(&config.agent.log_level);
    if ads_only {
        config.mode.ads_only = true;
    }

    info!(name = %config.agent.name, "starting nudge serve");

    let prometheus_render = if config.prometheus.enabled {
        match install_prometheus() {
            Ok(render) => Some(render),
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    let store = nudge_storage::open_store(&config.storage).await?;

    let backend = Arc::new(AnthropicBackend::new(&config.responder).inspect_err(|e| {
        error!(error = %e, "failed to initialize Anthropic backend");
        eprintln!(
            "error: Anthropic API key required. Set via: config (responder.api_key) or ANTHROPIC_API_KEY env var"
        );
    })?);
    info!(model = backend.model(), "AI backend ready");
    let responder = Arc::new(AiResponder::new(
        backend.clone(),
        RetryPolicy::from_config(&config.responder),
    ));

    let channel = nudge_gateway::build_channel(&config.channel)?;

    let mode = ModeSwitch::new(ModeFlag::from_ads_only(config.mode.ads_only));
    info!(mode = %mode.current(), "operating mode set");

    let followups = Arc::new(FollowupQueue::new(RetrySchedule::from_config(
        &config.followup,
    )));

    let engine = Arc::new(Engine::new(
        &config.router,
        Arc::clone(&store),
        Arc::clone(&channel),
        responder,
        mode.clone(),
        Arc::clone(&followups),
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel(config.gateway.inbound_buffer.max(1));

    let adapters: Vec<Arc<dyn PluginAdapter>> = vec![
        store.clone() as Arc<dyn PluginAdapter>,
        channel.clone() as Arc<dyn PluginAdapter>,
        backend as Arc<dyn PluginAdapter>,
    ];
    let mut health = HealthState::new(adapters);
    health.prometheus_render = prometheus_render;

    if config.gateway.admin_token.is_none() {
        warn!("gateway.admin_token not set, admin endpoint is disabled");
    }
    let gateway_state = GatewayState {
        inbound_tx,
        mode,
        verify_token: config.gateway.verify_token.clone(),
        auth: AuthConfig {
            admin_token: config.gateway.admin_token.clone(),
        },
        health,
    };

    let cancel = shutdown::install_signal_handler();

    let sweeper = Sweeper::new(
        Arc::clone(&engine),
        Duration::from_secs(config.followup.sweep_interval_secs.max(1)),
    );
    let sweeper_task = tokio::spawn(sweeper.run(cancel.clone()));

    let gateway_config = config.gateway.clone();
    let gateway_cancel = cancel.clone();
    let gateway_task = tokio::spawn(async move {
        nudge_gateway::start_server(&gateway_config, gateway_state, gateway_cancel).await
    });

    let agent = AgentLoop::new(
        engine,
        inbound_rx,
        config.agent.max_in_flight,
        Duration::from_secs(config.agent.shutdown_timeout_secs),
    );
    agent.run(cancel.clone()).await?;

    // The loop also stops when the gateway dies and drops its sender.
    cancel.cancel();

    if let Err(e) = sweeper_task.await {
        error!(error = %e, "sweeper task panicked");
    }
    let gateway_result = match gateway_task.await {
        Ok(result) => result,
        Err(e) => Err(NudgeError::Internal(format!("gateway task panicked: {e}"))),
    };

    let pending = followups.len();
    if pending > 0 {
        warn!(pending, "pending follow-ups discarded at shutdown");
    }

    gateway_result?;
    info!("nudge serve shutdown complete");
    Ok(())
}

/// Installs the global Prometheus recorder and returns its renderer.
fn install_prometheus() -> Result<MetricsRender, NudgeError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| NudgeError::Internal(format!("failed to install Prometheus recorder: {e}")))?;
    recording::register_metrics();
    info!("prometheus metrics recorder installed");
    Ok(Arc::new(move || handle.render()))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nudge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
