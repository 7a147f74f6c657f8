// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process follow-up queue.
//!
//! Two indexes are kept under one mutex: entries by [`FollowupKey`] for
//! deduplication, and keys by (send_at, sequence) for due-time ordering. Every
//! operation is short and never awaits while holding the lock.
//!
//! Scheduled follow-ups are deduplicated per (recipient, topic). Redeliveries
//! of failed replies each hold their own key and are never merged.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use nudge_core::{FollowupEntry, FollowupKey, SenderId, TopicTag};
use tracing::debug;

use crate::schedule::RetrySchedule;

/// Result of [`FollowupQueue::requeue_with_backoff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// Rescheduled for another attempt.
    Requeued { send_at: DateTime<Utc>, attempts: u32 },
    /// Attempt budget used up. The entry is not in the queue; the caller reports it.
    Exhausted(FollowupEntry),
    /// A newer follow-up for the same recipient and topic was enqueued meanwhile.
    Superseded,
}

/// Due entries taken out of the queue by [`FollowupQueue::due_entries`].
///
/// Ordered by send time, then by insertion order.
#[derive(Debug)]
pub struct DueEntries {
    inner: std::vec::IntoIter<FollowupEntry>,
}

impl Iterator for DueEntries {
    type Item = FollowupEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DueEntries {}

#[derive(Debug)]
struct Slot {
    entry: FollowupEntry,
    seq: u64,
}

#[derive(Debug, Default)]
struct Index {
    by_key: HashMap<FollowupKey, Slot>,
    by_time: BTreeMap<(DateTime<Utc>, u64), FollowupKey>,
    next_seq: u64,
}

impl Index {
    /// Insert under a fresh sequence number. A pending entry with the same key
    /// is replaced, and the later of the two send times is kept.
    fn insert(&mut self, mut entry: FollowupEntry) -> Option<FollowupEntry> {
        let replaced = self.remove(&entry.key());
        if let Some(previous) = &replaced {
            entry.send_at = entry.send_at.max(previous.send_at);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = entry.key();
        self.by_time.insert((entry.send_at, seq), key.clone());
        self.by_key.insert(key, Slot { entry, seq });
        replaced
    }

    fn remove(&mut self, key: &FollowupKey) -> Option<FollowupEntry> {
        let slot = self.by_key.remove(key)?;
        self.by_time.remove(&(slot.entry.send_at, slot.seq));
        Some(slot.entry)
    }
}

/// Pending follow-ups, deduplicated per (recipient, topic).
#[derive(Debug)]
pub struct FollowupQueue {
    index: Mutex<Index>,
    schedule: RetrySchedule,
}

impl FollowupQueue {
    /// Create an empty queue. `schedule` bounds and spaces redelivery attempts.
    pub fn new(schedule: RetrySchedule) -> Self {
        Self {
            index: Mutex::new(Index::default()),
            schedule,
        }
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule a follow-up.
    ///
    /// An entry already pending under the same key is replaced and returned.
    /// The surviving entry carries the new payload and the later of the two
    /// send times, and queues behind others due at that time.
    pub fn enqueue(&self, entry: FollowupEntry) -> Option<FollowupEntry> {
        let recipient = entry.recipient.clone();
        let topic = entry.topic;
        let send_at = entry.send_at;
        let replaced = self.lock().insert(entry);
        debug!(
            recipient = %recipient,
            topic = %topic,
            send_at = %send_at,
            replaced = replaced.is_some(),
            "follow-up enqueued"
        );
        replaced
    }

    /// Remove and return every entry with `send_at <= now`.
    ///
    /// Selection and removal happen in one critical section, so an entry is
    /// handed out at most once and concurrent enqueues are never lost.
    pub fn due_entries(&self, now: DateTime<Utc>) -> DueEntries {
        let mut index = self.lock();
        let mut due = Vec::new();
        while let Some(entry) = index.by_time.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let key = entry.remove();
            if let Some(slot) = index.by_key.remove(&key) {
                due.push(slot.entry);
            }
        }
        DueEntries {
            inner: due.into_iter(),
        }
    }

    /// Put back an entry whose delivery just failed.
    ///
    /// `Superseded` only happens to scheduled entries: a redelivery's key is
    /// unique to it.
    pub fn requeue_with_backoff(&self, mut entry: FollowupEntry, now: DateTime<Utc>) -> RequeueOutcome {
        entry.attempts = entry.attempts.saturating_add(1);
        if entry.attempts >= self.schedule.max_attempts {
            return RequeueOutcome::Exhausted(entry);
        }

        let mut index = self.lock();
        if index.by_key.contains_key(&entry.key()) {
            return RequeueOutcome::Superseded;
        }
        let send_at = now
            .checked_add_signed(self.schedule.backoff(entry.attempts))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let attempts = entry.attempts;
        entry.send_at = send_at;
        index.insert(entry);
        RequeueOutcome::Requeued { send_at, attempts }
    }

    /// Drop the scheduled follow-up for this recipient and topic.
    ///
    /// Pending redeliveries are left alone.
    pub fn cancel(&self, recipient: &SenderId, topic: TopicTag) -> Option<FollowupEntry> {
        self.lock().remove(&FollowupEntry::scheduled_key(recipient, topic))
    }

    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending entries for one recipient, earliest first.
    pub fn pending_for(&self, recipient: &SenderId) -> Vec<FollowupEntry> {
        let index = self.lock();
        index
            .by_time
            .values()
            .filter(|key| &key.recipient == recipient)
            .filter_map(|key| index.by_key.get(key))
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Send time of the earliest pending entry.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.lock().by_time.keys().next().map(|(at, _)| *at)
    }
}

impl Default for FollowupQueue {
    fn default() -> Self {
        Self::new(RetrySchedule::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use nudge_core::FollowupPayload;
    use std::sync::Arc;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn generate(who: &str, topic: TopicTag, at: i64) -> FollowupEntry {
        FollowupEntry::generate(SenderId::new(who), topic, ts(at))
    }

    fn schedule(max_attempts: u32) -> RetrySchedule {
        RetrySchedule {
            max_attempts,
            base: TimeDelta::seconds(30),
            max: TimeDelta::seconds(3600),
        }
    }

    #[test]
    fn duplicate_key_keeps_one_entry_at_the_later_time() {
        let queue = FollowupQueue::default();
        assert!(queue.enqueue(generate("bob", TopicTag::GoalSetting, 100)).is_none());
        let replaced = queue.enqueue(generate("bob", TopicTag::GoalSetting, 50));
        assert_eq!(replaced.map(|e| e.send_at), Some(ts(100)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.due_entries(ts(60)).len(), 0);
        assert_eq!(queue.next_due(), Some(ts(100)));

        let queue = FollowupQueue::default();
        queue.enqueue(generate("bob", TopicTag::GoalSetting, 50));
        queue.enqueue(generate("bob", TopicTag::GoalSetting, 100));
        assert_eq!(queue.len(), 1);

        let due: Vec<_> = queue.due_entries(ts(100)).collect();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].send_at, ts(100));
        assert!(queue.is_empty());
    }

    #[test]
    fn scheduled_followup_never_displaces_a_redelivery() {
        let queue = FollowupQueue::default();
        let bob = SenderId::new("bob");
        let resend = FollowupEntry::redelivery(
            bob.clone(),
            TopicTag::GoalSetting,
            "Aim for three sessions a week.".into(),
            ts(0),
        );
        assert!(matches!(
            queue.requeue_with_backoff(resend, ts(0)),
            RequeueOutcome::Requeued { .. }
        ));

        assert!(queue.enqueue(generate("bob", TopicTag::GoalSetting, 500)).is_none());
        assert_eq!(queue.len(), 2);
        assert!(queue.cancel(&bob, TopicTag::GoalSetting).is_some());

        let pending = queue.pending_for(&bob);
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].payload,
            FollowupPayload::Text("Aim for three sessions a week.".into())
        );
    }

    #[test]
    fn two_failed_replies_on_one_topic_are_both_retried() {
        let queue = FollowupQueue::default();
        let resend = |text: &str| {
            FollowupEntry::redelivery(
                SenderId::new("ana"),
                TopicTag::NutritionHelp,
                text.into(),
                ts(0),
            )
        };
        for text in ["first", "second"] {
            assert!(matches!(
                queue.requeue_with_backoff(resend(text), ts(0)),
                RequeueOutcome::Requeued { attempts: 1, .. }
            ));
        }
        assert_eq!(queue.due_entries(ts(3_600)).len(), 2);
    }

    #[test]
    fn different_topics_do_not_dedup() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("bob", TopicTag::GoalSetting, 10));
        queue.enqueue(generate("bob", TopicTag::NutritionHelp, 10));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_for(&SenderId::new("bob")).len(), 2);
    }

    #[test]
    fn due_entries_are_ordered_by_time_then_insertion() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("carol", TopicTag::GeneralCheckIn, 20));
        queue.enqueue(generate("alice", TopicTag::GeneralCheckIn, 10));
        queue.enqueue(generate("bob", TopicTag::GeneralCheckIn, 10));
        queue.enqueue(generate("dave", TopicTag::GeneralCheckIn, 99));

        let order: Vec<_> = queue
            .due_entries(ts(20))
            .map(|e| e.recipient.0)
            .collect();
        assert_eq!(order, vec!["alice", "bob", "carol"]);
        assert_eq!(queue.next_due(), Some(ts(99)));
    }

    #[test]
    fn replacement_takes_a_fresh_sequence_number() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("alice", TopicTag::GeneralCheckIn, 10));
        queue.enqueue(generate("bob", TopicTag::GeneralCheckIn, 10));
        queue.enqueue(generate("alice", TopicTag::GeneralCheckIn, 10));

        let order: Vec<_> = queue.due_entries(ts(10)).map(|e| e.recipient.0).collect();
        assert_eq!(order, vec!["bob", "alice"]);
    }

    #[test]
    fn draining_twice_yields_nothing_new() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("alice", TopicTag::GoalSetting, 5));
        assert_eq!(queue.due_entries(ts(5)).len(), 1);
        assert_eq!(queue.due_entries(ts(5)).len(), 0);
    }

    #[test]
    fn nothing_due_before_send_time() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("alice", TopicTag::GoalSetting, 5));
        assert_eq!(queue.due_entries(ts(4)).len(), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn requeue_backs_off_then_exhausts() {
        let queue = FollowupQueue::new(schedule(3));
        let entry = FollowupEntry::redelivery(
            SenderId::new("alice"),
            TopicTag::NutritionHelp,
            "Try oats!".into(),
            ts(0),
        );

        let outcome = queue.requeue_with_backoff(entry, ts(100));
        assert_eq!(
            outcome,
            RequeueOutcome::Requeued { send_at: ts(130), attempts: 1 }
        );

        let entry = queue.due_entries(ts(130)).next().unwrap();
        assert_eq!(entry.payload, FollowupPayload::Text("Try oats!".into()));
        let outcome = queue.requeue_with_backoff(entry, ts(130));
        assert_eq!(
            outcome,
            RequeueOutcome::Requeued { send_at: ts(190), attempts: 2 }
        );

        let entry = queue.due_entries(ts(190)).next().unwrap();
        match queue.requeue_with_backoff(entry, ts(190)) {
            RequeueOutcome::Exhausted(entry) => assert_eq!(entry.attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_yields_to_newer_entry() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("alice", TopicTag::GoalSetting, 10));
        let taken = queue.due_entries(ts(10)).next().unwrap();

        queue.enqueue(generate("alice", TopicTag::GoalSetting, 500));
        assert_eq!(queue.requeue_with_backoff(taken, ts(10)), RequeueOutcome::Superseded);
        assert_eq!(queue.pending_for(&SenderId::new("alice"))[0].send_at, ts(500));
    }

    #[test]
    fn cancel_removes_only_that_topic() {
        let queue = FollowupQueue::default();
        queue.enqueue(generate("alice", TopicTag::GoalSetting, 10));
        queue.enqueue(generate("alice", TopicTag::NutritionHelp, 10));
        let alice = SenderId::new("alice");

        assert!(queue.cancel(&alice, TopicTag::GoalSetting).is_some());
        assert!(queue.cancel(&alice, TopicTag::GoalSetting).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.due_entries(ts(10)).len(), 1);
    }

    #[test]
    fn concurrent_enqueue_and_drain_loses_nothing() {
        let queue = Arc::new(FollowupQueue::default());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(generate(&format!("p{p}-{i}"), TopicTag::GeneralCheckIn, i));
                    }
                })
            })
            .collect();

        let drainer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..200 {
                    seen.extend(queue.due_entries(ts(1_000)));
                    std::thread::yield_now();
                }
                seen
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        let mut seen = drainer.join().unwrap();
        seen.extend(queue.due_entries(ts(1_000)));

        let mut ids: Vec<_> = seen.into_iter().map(|e| e.recipient.0).collect();
        ids.sort();
        let total = ids.len();
        ids.dedup();
        assert_eq!(total, 1_000);
        assert_eq!(ids.len(), 1_000);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn drained_entries_are_sorted_and_unique(
                ops in prop::collection::vec((0u8..6, 0usize..4, 0i64..100), 1..60),
                now in 0i64..100,
            ) {
                let queue = FollowupQueue::default();
                for (who, topic, at) in &ops {
                    queue.enqueue(generate(&format!("s{who}"), TopicTag::ALL[*topic], *at));
                }
                let pending = queue.len();
                let due: Vec<_> = queue.due_entries(ts(now)).collect();

                prop_assert!(due.windows(2).all(|w| w[0].send_at <= w[1].send_at));
                prop_assert!(due.iter().all(|e| e.send_at <= ts(now)));
                let mut keys: Vec<_> = due.iter().map(|e| (e.recipient.clone(), e.topic)).collect();
                keys.sort();
                keys.dedup();
                prop_assert_eq!(keys.len(), due.len());
                prop_assert_eq!(queue.len() + due.len(), pending);
            }
        }
    }
}
