// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event engine: read state, route, dispatch, write state back.
//!
//! The whole read-decide-write cycle for one contact runs under that contact's
//! lock, so concurrent events never lose history and the recorded reply is
//! always the text handed to the channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nudge_config::model::RouterConfig;
use nudge_core::{
    Action, ConversationState, ConversationStore, DeliveryStatus, EventKind, FollowupEntry,
    FollowupPayload, HistoryEntry, InboundEvent, MessagingChannel, NudgeError, ReplySource,
    SenderId, TopicTag,
};
use nudge_followup::{FollowupQueue, RequeueOutcome};
use nudge_responder::AiResponder;
use nudge_router::{ActionRouter, ModeSwitch, TopicClassifier, resolves_followup, templates};
use tracing::{debug, error, info, warn};

use crate::locks::RecipientLocks;
use crate::recording;

/// What the engine did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledEvent {
    /// The routed action.
    pub action: Action,
    /// Text handed to the channel, if the action produced one.
    pub reply: Option<String>,
    /// Where `reply` came from.
    pub source: Option<ReplySource>,
    pub delivery: DeliveryStatus,
}

/// Processes inbound events and due follow-ups.
///
/// Shared behind an `Arc` by the agent loop and the sweeper. Each contact's
/// events are serialized through [`RecipientLocks`]; different contacts are
/// handled concurrently.
pub struct Engine {
    store: Arc<dyn ConversationStore>,
    channel: Arc<dyn MessagingChannel>,
    responder: Arc<AiResponder>,
    router: ActionRouter,
    classifier: TopicClassifier,
    mode: ModeSwitch,
    followups: Arc<FollowupQueue>,
    locks: RecipientLocks,
}

impl Engine {
    /// Wire an engine from its adapters. The mode switch and follow-up queue
    /// are shared with the gateway and the sweeper.
    pub fn new(
        router_config: &RouterConfig,
        store: Arc<dyn ConversationStore>,
        channel: Arc<dyn MessagingChannel>,
        responder: Arc<AiResponder>,
        mode: ModeSwitch,
        followups: Arc<FollowupQueue>,
    ) -> Self {
        Self {
            store,
            channel,
            responder,
            router: ActionRouter::new(router_config),
            classifier: TopicClassifier::new(),
            mode,
            followups,
            locks: RecipientLocks::new(),
        }
    }

    pub fn mode(&self) -> &ModeSwitch {
        &self.mode
    }

    pub fn followups(&self) -> &Arc<FollowupQueue> {
        &self.followups
    }

    pub fn locks(&self) -> &RecipientLocks {
        &self.locks
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Process one inbound or scheduled event end to end.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<HandledEvent, NudgeError> {
        recording::record_event(event.kind);
        let _guard = self.locks.acquire(&event.sender).await;

        let mut state = self.store.get(&event.sender).await?;
        let previous_topic = state.topic;
        self.classify(&event, &mut state);

        let mode = self.mode.current();
        let action = self.router.route(&event, &state, mode);
        recording::record_action(&action);
        debug!(
            sender = %event.sender,
            kind = %event.kind,
            mode = %mode,
            action = action.name(),
            "event routed"
        );

        if resolves_followup(&event, &action) {
            self.cancel_pending(&event.sender, [previous_topic, state.topic]);
        }

        let handled = self.dispatch(&event, &state, action).await;
        state.record(HistoryEntry {
            at: event.timestamp,
            event_kind: event.kind,
            action: handled.action.clone(),
            reply: handled.reply.clone(),
            reply_source: handled.source,
            delivery: handled.delivery,
        });
        self.store.put(state).await?;
        Ok(handled)
    }

    /// Process a follow-up taken from the queue.
    ///
    /// `Generate` entries become scheduled triggers. `Text` entries are
    /// redelivered verbatim and requeued again on failure.
    pub async fn handle_followup(
        &self,
        entry: FollowupEntry,
        now: DateTime<Utc>,
    ) -> Result<DeliveryStatus, NudgeError> {
        match entry.payload {
            FollowupPayload::Generate => {
                let event = InboundEvent::scheduled_trigger(entry.recipient, entry.topic, now);
                Ok(self.handle_event(event).await?.delivery)
            }
            FollowupPayload::Text(ref text) => {
                let text = text.clone();
                let recipient = entry.recipient.clone();
                let _guard = self.locks.acquire(&recipient).await;
                let status = match self.channel.deliver(&recipient, &text).await {
                    Ok(()) => {
                        info!(
                            recipient = %recipient,
                            attempts = entry.attempts,
                            "requeued reply redelivered"
                        );
                        DeliveryStatus::Redelivered
                    }
                    Err(e) => {
                        warn!(recipient = %recipient, error = %e, "redelivery failed");
                        self.requeue(entry, now)
                    }
                };
                if status != DeliveryStatus::Requeued {
                    let mut state = self.store.get(&recipient).await?;
                    if state.settle_requeued(&text, status) {
                        self.store.put(state).await?;
                    }
                }
                Ok(status)
            }
        }
    }

    fn classify(&self, event: &InboundEvent, state: &mut ConversationState) {
        if event.kind != EventKind::Message {
            return;
        }
        let Some(found) = event.text.as_deref().and_then(|t| self.classifier.classify(t)) else {
            return;
        };
        if found.topic != state.topic {
            debug!(
                sender = %event.sender,
                from = %state.topic,
                to = %found.topic,
                hits = found.hits,
                "conversation topic changed"
            );
            state.topic = found.topic;
        }
    }

    /// Drop pending generated follow-ups; the contact is talking again.
    fn cancel_pending(&self, sender: &SenderId, topics: [TopicTag; 2]) {
        for pending in self.followups.pending_for(sender) {
            if pending.payload == FollowupPayload::Generate
                && topics.contains(&pending.topic)
                && self.followups.cancel(sender, pending.topic).is_some()
            {
                debug!(sender = %sender, topic = %pending.topic, "pending follow-up cancelled");
            }
        }
    }

    async fn dispatch(
        &self,
        event: &InboundEvent,
        state: &ConversationState,
        action: Action,
    ) -> HandledEvent {
        let topic = event.topic.unwrap_or(state.topic);
        match action {
            Action::ReplyWithAi { ref prompt } => {
                let reply = self.responder.generate(prompt).await;
                let delivery = self.deliver(&event.sender, topic, &reply.text).await;
                HandledEvent {
                    reply: Some(reply.text),
                    source: Some(reply.source),
                    delivery,
                    action,
                }
            }
            Action::ReplyWithTemplate { template } => {
                let text = templates::render(template);
                let delivery = self.deliver(&event.sender, topic, text).await;
                HandledEvent {
                    reply: Some(text.to_string()),
                    source: Some(ReplySource::Template),
                    delivery,
                    action,
                }
            }
            Action::EnqueueFollowup { send_at, topic } => {
                self.followups.enqueue(FollowupEntry::generate(
                    event.sender.clone(),
                    topic,
                    send_at,
                ));
                HandledEvent {
                    reply: None,
                    source: None,
                    delivery: DeliveryStatus::NotApplicable,
                    action,
                }
            }
            Action::NoOp => HandledEvent {
                reply: None,
                source: None,
                delivery: DeliveryStatus::NotApplicable,
                action,
            },
        }
    }

    async fn deliver(&self, recipient: &SenderId, topic: TopicTag, text: &str) -> DeliveryStatus {
        let delivered = self.channel.deliver(recipient, text).await;
        match delivered {
            Ok(()) => DeliveryStatus::Delivered,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "reply delivery failed, requeueing");
                let now = Utc::now();
                let entry = FollowupEntry::redelivery(recipient.clone(), topic, text.to_string(), now);
                self.requeue(entry, now)
            }
        }
    }

    fn requeue(&self, entry: FollowupEntry, now: DateTime<Utc>) -> DeliveryStatus {
        let recipient = entry.recipient.clone();
        match self.followups.requeue_with_backoff(entry, now) {
            RequeueOutcome::Requeued { send_at, attempts } => {
                debug!(recipient = %recipient, %send_at, attempts, "delivery requeued");
                DeliveryStatus::Requeued
            }
            RequeueOutcome::Exhausted(entry) => {
                report_dropped(&entry);
                DeliveryStatus::Failed
            }
            RequeueOutcome::Superseded => {
                warn!(recipient = %recipient, "newer follow-up pending, redelivery discarded");
                DeliveryStatus::Failed
            }
        }
    }
}

/// Log and count a follow-up that will never be delivered.
pub(crate) fn report_dropped(entry: &FollowupEntry) {
    error!(
        recipient = %entry.recipient,
        topic = %entry.topic,
        attempts = entry.attempts,
        "follow-up dropped after exhausting delivery attempts"
    );
    recording::record_followup_dropped();
}
