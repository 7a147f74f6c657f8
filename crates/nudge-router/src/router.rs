// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Action routing for inbound events.
//!
//! `route` is a pure function of (event, state, mode): no clock, no randomness,
//! no I/O. Every input maps to an [`Action`], with `NoOp` for combinations that
//! have nothing sensible to do.

use chrono::{DateTime, TimeDelta, Utc};
use nudge_config::model::RouterConfig;
use nudge_core::{
    Action, ConversationState, EventKind, InboundEvent, ModeFlag, TemplateId, TemplateKind,
    TopicTag,
};
use tracing::debug;

/// Decides what to do with each inbound event.
pub struct ActionRouter {
    followup_delay: TimeDelta,
    ads_followup_delay: TimeDelta,
    stale_after: TimeDelta,
    history_window: usize,
}

impl ActionRouter {
    /// Create a router with the given policy.
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            followup_delay: secs(config.followup_delay_secs),
            ads_followup_delay: secs(config.ads_followup_delay_secs),
            stale_after: secs(config.stale_after_secs),
            history_window: config.history_window,
        }
    }

    /// Route an event against the sender's current state.
    ///
    /// `mode` is the process-wide mode read once for this event; a per-contact
    /// override in `state` takes precedence.
    pub fn route(&self, event: &InboundEvent, state: &ConversationState, mode: ModeFlag) -> Action {
        if event.sender != state.sender {
            debug!(
                event_sender = %event.sender,
                state_sender = %state.sender,
                "state does not belong to event sender"
            );
            return Action::NoOp;
        }

        match state.effective_mode(mode) {
            ModeFlag::AdsOnly => self.route_ads_only(event, state),
            ModeFlag::Normal => self.route_normal(event, state),
        }
    }

    /// Ads-only rule set: templates and follow-ups, never an AI call.
    fn route_ads_only(&self, event: &InboundEvent, state: &ConversationState) -> Action {
        match event.kind {
            EventKind::Message if message_text(event).is_some() => Action::ReplyWithTemplate {
                template: TemplateId::new(TemplateKind::AdsReply, state.topic),
            },
            EventKind::Message => Action::NoOp,
            EventKind::AdClick => {
                schedule_followup(event.timestamp, self.ads_followup_delay, state.topic)
            }
            EventKind::ScheduledTrigger => Action::ReplyWithTemplate {
                template: TemplateId::new(TemplateKind::ReEngagement, trigger_topic(event, state)),
            },
        }
    }

    fn route_normal(&self, event: &InboundEvent, state: &ConversationState) -> Action {
        match event.kind {
            EventKind::Message => match message_text(event) {
                Some(text) => Action::ReplyWithAi {
                    prompt: self.reply_prompt(text, state),
                },
                None => Action::NoOp,
            },
            EventKind::AdClick => schedule_followup(event.timestamp, self.followup_delay, state.topic),
            EventKind::ScheduledTrigger => {
                let topic = trigger_topic(event, state);
                if self.is_stale(event.timestamp, state) {
                    Action::ReplyWithTemplate {
                        template: TemplateId::new(TemplateKind::ReEngagement, topic),
                    }
                } else {
                    Action::ReplyWithAi {
                        prompt: self.followup_prompt(topic, state),
                    }
                }
            }
        }
    }

    /// True when the contact has been silent longer than the stale threshold.
    ///
    /// A contact never reached before counts as stale.
    fn is_stale(&self, now: DateTime<Utc>, state: &ConversationState) -> bool {
        match state.last_contacted {
            Some(last) => now.signed_duration_since(last) > self.stale_after,
            None => true,
        }
    }

    fn reply_prompt(&self, text: &str, state: &ConversationState) -> String {
        let mut prompt = format!("Topic: {}\n", state.topic.label());
        self.push_history(&mut prompt, state);
        prompt.push_str("Contact's message:\n");
        prompt.push_str(text);
        prompt.push_str("\n\nWrite the coach's next reply.");
        prompt
    }

    fn followup_prompt(&self, topic: TopicTag, state: &ConversationState) -> String {
        let mut prompt = format!("Topic: {}\n", topic.label());
        self.push_history(&mut prompt, state);
        if let Some(last) = state.last_contacted {
            prompt.push_str(&format!("Last contact: {}\n", last.to_rfc3339()));
        }
        prompt.push_str(&format!(
            "\nThe contact has gone quiet. Write a short, friendly follow-up that re-opens \
             the conversation about {}.",
            topic.label().to_lowercase()
        ));
        prompt
    }

    fn push_history(&self, prompt: &mut String, state: &ConversationState) {
        let recent = state.recent_replies(self.history_window);
        if recent.is_empty() {
            return;
        }
        prompt.push_str("Recent replies from the coach:\n");
        for reply in recent {
            prompt.push_str("- ");
            prompt.push_str(reply);
            prompt.push('\n');
        }
    }
}

/// A contact writing back and getting a reply resolves any pending follow-up on that topic.
pub fn resolves_followup(event: &InboundEvent, action: &Action) -> bool {
    event.kind == EventKind::Message && action.is_reply()
}

fn message_text(event: &InboundEvent) -> Option<&str> {
    event
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn trigger_topic(event: &InboundEvent, state: &ConversationState) -> TopicTag {
    event.topic.unwrap_or(state.topic)
}

/// `NoOp` if the send time would fall outside the representable range.
fn schedule_followup(from: DateTime<Utc>, delay: TimeDelta, topic: TopicTag) -> Action {
    match from.checked_add_signed(delay) {
        Some(send_at) => Action::EnqueueFollowup { send_at, topic },
        None => Action::NoOp,
    }
}

fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
