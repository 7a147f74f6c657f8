// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed pool of canned replies, keyed by template kind and topic.

use nudge_core::{TemplateId, TemplateKind, TopicTag};

/// Returns the text for a template. Every (kind, topic) pair has an entry.
pub fn render(template: TemplateId) -> &'static str {
    use TemplateKind::*;
    use TopicTag::*;

    match (template.kind, template.topic) {
        (AdsReply, GeneralCheckIn) => {
            "Hey! Thanks for reaching out 🙌 Tell me a bit about where you're at right now \
             and I'll point you to the right next step."
        }
        (AdsReply, NutritionHelp) => {
            "Thanks for your message! Nutrition is where most results are made. \
             What does a typical day of eating look like for you?"
        }
        (AdsReply, WorkoutQuestions) => {
            "Love that you're asking! How many days a week are you training right now, \
             and what does a usual session look like?"
        }
        (AdsReply, GoalSetting) => {
            "Awesome, let's get your goal locked in. What result do you want, \
             and by when?"
        }
        (ReEngagement, GeneralCheckIn) => {
            "Hey, just checking in! How have things been going since we last talked?"
        }
        (ReEngagement, NutritionHelp) => {
            "Quick check-in on your nutrition: how have your meals been this week? \
             Happy to help you adjust anything."
        }
        (ReEngagement, WorkoutQuestions) => {
            "Checking in on your training! Did you get your sessions in this week?"
        }
        (ReEngagement, GoalSetting) => {
            "Hey! How are you tracking toward your goal? Let me know if you want \
             help setting up the next step."
        }
    }
}
