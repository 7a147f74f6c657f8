// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end engine tests over mock adapters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use nudge_agent::AgentLoop;
use nudge_config::model::{FollowupConfig, RouterConfig};
use nudge_core::{
    Action, DeliveryStatus, FollowupPayload, InboundEvent, ModeFlag, ReplySource, SenderId,
    TemplateId, TemplateKind, TopicTag,
};
use nudge_router::templates;
use nudge_test_utils::harness::TEST_PLACEHOLDER;
use nudge_test_utils::{MockBackend, TestHarness};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

const T0: i64 = 1_760_000_000;

#[tokio::test]
async fn alice_gets_an_ai_reply_about_nutrition() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Greek yogurt with berries is a great start!"])
        .build()
        .await
        .unwrap();

    let handled = harness
        .message("alice", "What should I eat for breakfast to get more protein?", ts(T0))
        .await
        .unwrap();

    let Action::ReplyWithAi { prompt } = &handled.action else {
        panic!("expected ReplyWithAi, got {:?}", handled.action);
    };
    assert!(prompt.contains("Nutrition Help"));
    assert_eq!(handled.source, Some(ReplySource::Ai));
    assert_eq!(handled.delivery, DeliveryStatus::Delivered);
    assert_eq!(
        harness.channel.sent_to("alice").await,
        vec!["Greek yogurt with berries is a great start!"]
    );

    let state = harness.state("alice").await.unwrap();
    assert_eq!(state.topic, TopicTag::NutritionHelp);
    assert_eq!(state.last_contacted, Some(ts(T0)));
    assert_eq!(state.history.len(), 1);
    assert_eq!(
        state.history[0].reply.as_deref(),
        Some("Greek yogurt with berries is a great start!")
    );
    assert!(harness.followups.is_empty());
}

#[tokio::test]
async fn bob_ad_click_in_ads_only_mode_never_calls_ai() {
    let harness = TestHarness::builder()
        .with_mode(ModeFlag::AdsOnly)
        .build()
        .await
        .unwrap();

    let handled = harness.ad_click("bob", ts(T0)).await.unwrap();
    let expected_at = ts(T0 + 3_600);
    assert_eq!(
        handled.action,
        Action::EnqueueFollowup {
            send_at: expected_at,
            topic: TopicTag::GeneralCheckIn
        }
    );
    assert_eq!(harness.followups.next_due(), Some(expected_at));
    assert_eq!(harness.channel.sent_count().await, 0);

    let early = harness.sweep(ts(T0 + 3_599)).await;
    assert_eq!(early.dispatched, 0);

    let report = harness.sweep(expected_at).await;
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.delivered, 1);

    let template = TemplateId::new(TemplateKind::ReEngagement, TopicTag::GeneralCheckIn);
    assert_eq!(
        harness.channel.sent_to("bob").await,
        vec![templates::render(template).to_string()]
    );
    assert_eq!(harness.backend.calls(), 0);
    assert!(harness.followups.is_empty());

    let state = harness.state("bob").await.unwrap();
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.last_contacted, Some(expected_at));
}

#[tokio::test]
async fn ads_only_messages_use_templates() {
    let harness = TestHarness::builder()
        .with_mode(ModeFlag::AdsOnly)
        .build()
        .await
        .unwrap();

    for i in 0..5 {
        let handled = harness.message("carol", "hi there", ts(T0 + i)).await.unwrap();
        assert_eq!(handled.source, Some(ReplySource::Template));
    }
    assert_eq!(harness.backend.calls(), 0);
    assert_eq!(harness.channel.sent_to("carol").await.len(), 5);
}

#[tokio::test]
async fn mode_flip_applies_to_the_next_event() {
    let harness = TestHarness::new().await.unwrap();

    harness.message("dave", "hello", ts(T0)).await.unwrap();
    assert_eq!(harness.backend.calls(), 1);

    harness.mode.set(ModeFlag::AdsOnly);
    let handled = harness.message("dave", "hello again", ts(T0 + 1)).await.unwrap();
    assert!(matches!(handled.action, Action::ReplyWithTemplate { .. }));
    assert_eq!(harness.backend.calls(), 1);
}

#[tokio::test]
async fn unavailable_backend_sends_placeholder() {
    let harness = TestHarness::builder()
        .with_backend(MockBackend::failing())
        .with_max_attempts(2)
        .build()
        .await
        .unwrap();

    let handled = harness.message("erin", "any tips?", ts(T0)).await.unwrap();

    assert_eq!(handled.source, Some(ReplySource::Placeholder));
    assert_eq!(handled.reply.as_deref(), Some(TEST_PLACEHOLDER));
    assert_eq!(handled.delivery, DeliveryStatus::Delivered);
    assert_eq!(harness.backend.calls(), 2);
    assert_eq!(harness.channel.sent_to("erin").await, vec![TEST_PLACEHOLDER]);
}

#[tokio::test]
async fn failed_delivery_is_redelivered_by_the_sweeper() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Squats and lunges!"])
        .build()
        .await
        .unwrap();
    harness.channel.fail_next(1);

    let handled = harness
        .message("frank", "best leg workout at the gym?", ts(T0))
        .await
        .unwrap();
    assert_eq!(handled.delivery, DeliveryStatus::Requeued);

    let pending = harness.followups.pending_for(&SenderId::new("frank"));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload, FollowupPayload::Text("Squats and lunges!".into()));
    assert_eq!(pending[0].attempts, 1);

    let report = harness.sweep(Utc::now() + TimeDelta::hours(1)).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(harness.channel.sent_to("frank").await, vec!["Squats and lunges!"]);

    let state = harness.state("frank").await.unwrap();
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].delivery, DeliveryStatus::Redelivered);
}

#[tokio::test]
async fn undeliverable_reply_is_dropped_after_max_attempts() {
    let harness = TestHarness::builder()
        .with_followup(FollowupConfig {
            max_attempts: 2,
            ..FollowupConfig::default()
        })
        .build()
        .await
        .unwrap();
    harness.channel.set_failing(true);

    let handled = harness.message("gina", "hello", ts(T0)).await.unwrap();
    assert_eq!(handled.delivery, DeliveryStatus::Requeued);

    let report = harness.sweep(Utc::now() + TimeDelta::hours(1)).await;
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.failed, 1);
    assert!(harness.followups.is_empty());
    assert_eq!(harness.channel.failed_count(), 2);

    let state = harness.state("gina").await.unwrap();
    assert_eq!(state.history[0].delivery, DeliveryStatus::Failed);
}

#[tokio::test]
async fn ad_click_does_not_displace_a_pending_redelivery() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Squats and lunges!"])
        .build()
        .await
        .unwrap();
    harness.channel.fail_next(1);

    let handled = harness
        .message("frank", "best leg workout at the gym?", ts(T0))
        .await
        .unwrap();
    assert_eq!(handled.delivery, DeliveryStatus::Requeued);
    harness.ad_click("frank", ts(T0 + 60)).await.unwrap();

    let mut payloads: Vec<_> = harness
        .followups
        .pending_for(&SenderId::new("frank"))
        .into_iter()
        .map(|e| (e.payload, e.topic))
        .collect();
    payloads.sort_by_key(|(p, _)| p == &FollowupPayload::Generate);
    assert_eq!(
        payloads,
        vec![
            (
                FollowupPayload::Text("Squats and lunges!".into()),
                TopicTag::WorkoutQuestions
            ),
            (FollowupPayload::Generate, TopicTag::WorkoutQuestions),
        ]
    );

    let report = harness.sweep(Utc::now() + TimeDelta::days(30)).await;
    assert_eq!(report.delivered, 2);
    assert!(
        harness
            .channel
            .sent_to("frank")
            .await
            .contains(&"Squats and lunges!".to_string())
    );

    let state = harness.state("frank").await.unwrap();
    assert_eq!(state.history[0].delivery, DeliveryStatus::Redelivered);
    assert!(harness.followups.is_empty());
}

#[tokio::test]
async fn second_failed_reply_on_the_same_topic_is_also_retried() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Try oats.", "Add eggs too."])
        .build()
        .await
        .unwrap();
    harness.channel.fail_next(2);

    for (i, text) in ["breakfast protein ideas?", "more protein ideas for breakfast?"]
        .into_iter()
        .enumerate()
    {
        let handled = harness.message("lena", text, ts(T0 + i as i64)).await.unwrap();
        assert_eq!(handled.delivery, DeliveryStatus::Requeued);
    }
    assert_eq!(harness.followups.len(), 2);

    let report = harness.sweep(Utc::now() + TimeDelta::hours(1)).await;
    assert_eq!(report.delivered, 2);
    let state = harness.state("lena").await.unwrap();
    assert!(
        state
            .history
            .iter()
            .all(|h| h.delivery == DeliveryStatus::Redelivered)
    );
}

#[tokio::test]
async fn reply_to_message_cancels_pending_followup() {
    let harness = TestHarness::new().await.unwrap();

    harness.ad_click("hank", ts(T0)).await.unwrap();
    assert_eq!(harness.followups.len(), 1);

    harness.message("hank", "hey, I saw your ad", ts(T0 + 60)).await.unwrap();
    assert!(harness.followups.is_empty());
}

#[tokio::test]
async fn fresh_followup_in_normal_mode_asks_ai() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Sure, happy to help!", "How did the workout go?"])
        .build()
        .await
        .unwrap();

    harness.message("ivy", "I need a new workout routine", ts(T0)).await.unwrap();
    harness.ad_click("ivy", ts(T0 + 10)).await.unwrap();

    let due = ts(T0 + 10 + 86_400);
    assert_eq!(harness.followups.next_due(), Some(due));
    harness.sweep(due).await;

    assert_eq!(
        harness.channel.sent_to("ivy").await,
        vec!["Sure, happy to help!", "How did the workout go?"]
    );
    let prompts = harness.backend.prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("Sure, happy to help!"));
}

#[tokio::test]
async fn stale_followup_in_normal_mode_uses_template() {
    let harness = TestHarness::builder()
        .with_router(RouterConfig {
            followup_delay_secs: 10 * 86_400,
            ..RouterConfig::default()
        })
        .build()
        .await
        .unwrap();

    harness.ad_click("noah", ts(T0)).await.unwrap();
    let due = ts(T0 + 10 * 86_400);
    let report = harness.sweep(due).await;

    assert_eq!(report.delivered, 1);
    assert_eq!(harness.backend.calls(), 0);
    let template = TemplateId::new(TemplateKind::ReEngagement, TopicTag::GeneralCheckIn);
    assert_eq!(
        harness.channel.sent_to("noah").await,
        vec![templates::render(template).to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_events_for_one_sender_are_all_recorded() {
    let harness = Arc::new(TestHarness::new().await.unwrap());

    let mut handles = Vec::new();
    for i in 0..100 {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            harness
                .message("jack", &format!("message {i}"), ts(T0 + i))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let state = harness.state("jack").await.unwrap();
    assert_eq!(state.history.len(), 100);
    assert_eq!(state.last_contacted, Some(ts(T0 + 99)));
    assert_eq!(harness.channel.sent_to("jack").await.len(), 100);
}

#[tokio::test]
async fn sqlite_backed_harness_persists_history() {
    let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
    harness.message("kim", "goal: run a 10k", ts(T0)).await.unwrap();
    harness.message("kim", "any plan ideas?", ts(T0 + 5)).await.unwrap();

    let state = harness.state("kim").await.unwrap();
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.last_contacted, Some(ts(T0 + 5)));
}

#[tokio::test]
async fn agent_loop_processes_until_channel_closes() {
    let harness = TestHarness::new().await.unwrap();
    let (tx, rx) = mpsc::channel(16);
    let agent = AgentLoop::new(Arc::clone(&harness.engine), rx, 4, Duration::from_secs(5));

    for sender in ["liam", "mia", "liam"] {
        tx.send(InboundEvent::message(sender, "hello coach", ts(T0)))
            .await
            .unwrap();
    }
    drop(tx);

    agent.run(CancellationToken::new()).await.unwrap();

    assert_eq!(harness.state("liam").await.unwrap().history.len(), 2);
    assert_eq!(harness.state("mia").await.unwrap().history.len(), 1);
}

#[tokio::test]
async fn agent_loop_stops_on_cancel() {
    let harness = TestHarness::new().await.unwrap();
    let (_tx, rx) = mpsc::channel::<InboundEvent>(16);
    let agent = AgentLoop::new(Arc::clone(&harness.engine), rx, 4, Duration::from_secs(1));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(agent.run(cancel.clone()));
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok());
}
