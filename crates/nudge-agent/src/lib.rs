// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event processing for the Nudge engagement service.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Receives inbound events from the webhook gateway
//! - Runs each through the [`Engine`] under its sender's lock
//! - Bounds the number of events in flight
//! - Drains in-flight work on shutdown
//!
//! The [`Sweeper`] runs alongside it and dispatches due follow-ups.

pub mod engine;
pub mod locks;
pub mod recording;
pub mod shutdown;
pub mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use nudge_core::{InboundEvent, NudgeError};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use engine::{Engine, HandledEvent};
pub use locks::RecipientLocks;
pub use sweeper::{SweepReport, Sweeper};

/// Consumes inbound events and processes them concurrently across senders.
pub struct AgentLoop {
    engine: Arc<Engine>,
    inbound: mpsc::Receiver<InboundEvent>,
    max_in_flight: usize,
    drain_timeout: Duration,
}

impl AgentLoop {
    pub fn new(
        engine: Arc<Engine>,
        inbound: mpsc::Receiver<InboundEvent>,
        max_in_flight: usize,
        drain_timeout: Duration,
    ) -> Self {
        info!(max_in_flight, "agent loop initialized");
        Self {
            engine,
            inbound,
            max_in_flight: max_in_flight.max(1),
            drain_timeout,
        }
    }

    /// Runs until the token is cancelled or the inbound channel closes.
    ///
    /// On exit, in-flight events are drained for up to the drain timeout.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), NudgeError> {
        info!("agent loop running");
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
                event = self.inbound.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("inbound channel closed, stopping agent loop");
                        break;
                    }
                },
            };

            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| NudgeError::Internal(format!("event permits closed: {e}")))?;

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "event task panicked");
                }
            }

            let engine = Arc::clone(&self.engine);
            tasks.spawn(async move {
                let _permit = permit;
                let id = event.id.clone();
                let sender = event.sender.clone();
                match engine.handle_event(event).await {
                    Ok(handled) => debug!(
                        event_id = %id,
                        sender = %sender,
                        action = handled.action.name(),
                        "event handled"
                    ),
                    Err(e) => error!(event_id = %id, sender = %sender, error = %e, "failed to handle event"),
                }
            });
        }

        shutdown::drain_tasks(&mut tasks, self.drain_timeout).await;

        if let Err(e) = self.engine.store().shutdown().await {
            error!(error = %e, "conversation store shutdown failed");
        }
        info!("agent loop stopped");
        Ok(())
    }
}
