// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the router, responder, follow-up queue, and adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Upper bound on retained history entries per conversation.
///
/// Older entries are discarded first once the bound is reached.
pub const HISTORY_LIMIT: usize = 1000;

/// Identifier of a contact on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(pub String);

impl SenderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SenderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SenderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Store,
}

/// Subject of a conversation. Selects reply templates and frames AI prompts.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum TopicTag {
    #[default]
    #[strum(serialize = "General Check-in")]
    #[serde(rename = "General Check-in")]
    GeneralCheckIn,
    #[strum(serialize = "Nutrition Help")]
    #[serde(rename = "Nutrition Help")]
    NutritionHelp,
    #[strum(serialize = "Workout Questions")]
    #[serde(rename = "Workout Questions")]
    WorkoutQuestions,
    #[strum(serialize = "Goal Setting")]
    #[serde(rename = "Goal Setting")]
    GoalSetting,
}

impl TopicTag {
    /// Every topic, in declaration order.
    pub const ALL: [TopicTag; 4] = [
        TopicTag::GeneralCheckIn,
        TopicTag::NutritionHelp,
        TopicTag::WorkoutQuestions,
        TopicTag::GoalSetting,
    ];

    /// Human-readable label, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            TopicTag::GeneralCheckIn => "General Check-in",
            TopicTag::NutritionHelp => "Nutrition Help",
            TopicTag::WorkoutQuestions => "Workout Questions",
            TopicTag::GoalSetting => "Goal Setting",
        }
    }
}

/// What happened on the platform side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// The contact sent a direct message.
    Message,
    /// The contact clicked an advertisement that opens a conversation.
    AdClick,
    /// A follow-up became due in the follow-up queue.
    ScheduledTrigger,
}

/// A single inbound event. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Unique event identifier (also used as the webhook acknowledgement id).
    pub id: String,
    pub sender: SenderId,
    pub kind: EventKind,
    /// Message text for `message` events.
    #[serde(default)]
    pub text: Option<String>,
    /// Ad reference for `ad_click` events.
    #[serde(default)]
    pub payload: Option<String>,
    /// Topic of the follow-up that produced a `scheduled_trigger`.
    #[serde(default)]
    pub topic: Option<TopicTag>,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    fn with_kind(sender: SenderId, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            kind,
            text: None,
            payload: None,
            topic: None,
            timestamp,
        }
    }

    /// A direct message from `sender`.
    pub fn message(
        sender: impl Into<SenderId>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::with_kind(sender.into(), EventKind::Message, timestamp)
        }
    }

    /// An ad click by `sender`, optionally tagged with the ad reference.
    pub fn ad_click(
        sender: impl Into<SenderId>,
        payload: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            payload,
            ..Self::with_kind(sender.into(), EventKind::AdClick, timestamp)
        }
    }

    /// A due follow-up for `sender` about `topic`.
    pub fn scheduled_trigger(
        sender: impl Into<SenderId>,
        topic: TopicTag,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: Some(topic),
            ..Self::with_kind(sender.into(), EventKind::ScheduledTrigger, timestamp)
        }
    }
}

/// Process-wide operating mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModeFlag {
    /// AI-backed replies.
    #[default]
    Normal,
    /// Templated replies only; no AI calls.
    AdsOnly,
}

impl ModeFlag {
    pub fn from_ads_only(ads_only: bool) -> Self {
        if ads_only {
            ModeFlag::AdsOnly
        } else {
            ModeFlag::Normal
        }
    }

    pub fn is_ads_only(&self) -> bool {
        matches!(self, ModeFlag::AdsOnly)
    }
}

/// Which family of canned reply a template belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplateKind {
    /// Answer to a message while ads-only mode is active.
    AdsReply,
    /// Nudge for a conversation that went quiet.
    ReEngagement,
}

/// Identifies one template in the fixed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId {
    pub kind: TemplateKind,
    pub topic: TopicTag,
}

impl TemplateId {
    pub fn new(kind: TemplateKind, topic: TopicTag) -> Self {
        Self { kind, topic }
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.topic)
    }
}

/// Decision produced by the router and consumed by the engine's dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    ReplyWithAi { prompt: String },
    ReplyWithTemplate { template: TemplateId },
    EnqueueFollowup { send_at: DateTime<Utc>, topic: TopicTag },
    NoOp,
}

impl Action {
    /// Short stable name, used as a metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Action::ReplyWithAi { .. } => "reply_with_ai",
            Action::ReplyWithTemplate { .. } => "reply_with_template",
            Action::EnqueueFollowup { .. } => "enqueue_followup",
            Action::NoOp => "no_op",
        }
    }

    /// True when the action sends a reply to the contact.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            Action::ReplyWithAi { .. } | Action::ReplyWithTemplate { .. }
        )
    }
}

/// Where the text of a reply came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReplySource {
    /// Genuine model output.
    Ai,
    /// Fallback text used because the AI backend was unavailable.
    Placeholder,
    /// A canned template.
    Template,
}

/// Outcome of handing a reply to the messaging channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Nothing was sent (follow-up scheduling, no-op).
    NotApplicable,
    Delivered,
    /// First delivery failed; a redelivery sits in the follow-up queue.
    Requeued,
    /// A previously requeued reply went through on a later attempt.
    Redelivered,
    /// Delivery failed and no redelivery is pending.
    Failed,
}

/// One processed event in a conversation's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub event_kind: EventKind,
    pub action: Action,
    /// Text actually handed to the channel, if any.
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub reply_source: Option<ReplySource>,
    pub delivery: DeliveryStatus,
}

/// Per-contact conversation state, owned by the conversation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub sender: SenderId,
    #[serde(default)]
    pub topic: TopicTag,
    #[serde(default)]
    pub last_contacted: Option<DateTime<Utc>>,
    /// Per-contact mode override. `None` follows the process mode.
    #[serde(default)]
    pub ads_only_override: Option<bool>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ConversationState {
    /// Default state for a contact the store has never seen.
    pub fn fresh(sender: SenderId) -> Self {
        Self {
            sender,
            topic: TopicTag::default(),
            last_contacted: None,
            ads_only_override: None,
            history: Vec::new(),
        }
    }

    /// Mode that applies to this contact given the process-wide mode.
    pub fn effective_mode(&self, process_mode: ModeFlag) -> ModeFlag {
        self.ads_only_override
            .map(ModeFlag::from_ads_only)
            .unwrap_or(process_mode)
    }

    /// Appends a processed event.
    ///
    /// `last_contacted` only moves forward: events for one contact are
    /// serialized but may arrive out of timestamp order.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.last_contacted = Some(match self.last_contacted {
            Some(last) => last.max(entry.at),
            None => entry.at,
        });
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// The last `n` reply texts, oldest first.
    pub fn recent_replies(&self, n: usize) -> Vec<&str> {
        let mut replies: Vec<&str> = self
            .history
            .iter()
            .rev()
            .filter_map(|h| h.reply.as_deref())
            .take(n)
            .collect();
        replies.reverse();
        replies
    }

    /// Marks the oldest requeued reply with this exact text as redelivered.
    ///
    /// Returns false when no such entry exists.
    pub fn mark_redelivered(&mut self, text: &str) -> bool {
        self.settle_requeued(text, DeliveryStatus::Redelivered)
    }

    /// Sets the final delivery status of the oldest requeued reply with this
    /// exact text.
    pub fn settle_requeued(&mut self, text: &str, status: DeliveryStatus) -> bool {
        match self
            .history
            .iter_mut()
            .find(|h| h.delivery == DeliveryStatus::Requeued && h.reply.as_deref() == Some(text))
        {
            Some(entry) => {
                entry.delivery = status;
                true
            }
            None => false,
        }
    }
}

/// What a follow-up sends when it becomes due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum FollowupPayload {
    /// Route a scheduled trigger and send whatever the router decides.
    Generate,
    /// Resend this exact text; its first delivery failed.
    Text(String),
}

/// Deduplication key of the follow-up queue.
///
/// Scheduled follow-ups share one slot per recipient and topic. Every
/// redelivery gets a slot of its own, so a failed reply is never displaced by
/// a later follow-up or by another failed reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FollowupKey {
    pub recipient: SenderId,
    pub topic: TopicTag,
    pub slot: FollowupSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FollowupSlot {
    Scheduled,
    /// Keyed by the entry id.
    Redelivery(String),
}

fn new_followup_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A scheduled outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowupEntry {
    /// Stable across requeues.
    #[serde(default = "new_followup_id")]
    pub id: String,
    pub recipient: SenderId,
    pub topic: TopicTag,
    pub payload: FollowupPayload,
    pub send_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub attempts: u32,
}

impl FollowupEntry {
    /// A follow-up whose text is decided when it becomes due.
    pub fn generate(recipient: SenderId, topic: TopicTag, send_at: DateTime<Utc>) -> Self {
        Self {
            id: new_followup_id(),
            recipient,
            topic,
            payload: FollowupPayload::Generate,
            send_at,
            attempts: 0,
        }
    }

    /// A verbatim resend of a reply whose first delivery failed.
    pub fn redelivery(
        recipient: SenderId,
        topic: TopicTag,
        text: String,
        send_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_followup_id(),
            recipient,
            topic,
            payload: FollowupPayload::Text(text),
            send_at,
            attempts: 0,
        }
    }

    pub fn key(&self) -> FollowupKey {
        let slot = match self.payload {
            FollowupPayload::Generate => FollowupSlot::Scheduled,
            FollowupPayload::Text(_) => FollowupSlot::Redelivery(self.id.clone()),
        };
        FollowupKey {
            recipient: self.recipient.clone(),
            topic: self.topic,
            slot,
        }
    }

    /// Key of the scheduled follow-up for this recipient and topic.
    pub fn scheduled_key(recipient: &SenderId, topic: TopicTag) -> FollowupKey {
        FollowupKey {
            recipient: recipient.clone(),
            topic,
            slot: FollowupSlot::Scheduled,
        }
    }
}
