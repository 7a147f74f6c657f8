// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic topic classification.
//!
//! Maps inbound message text to a [`TopicTag`] using keyword signals.
//! Deterministic and local; no model call involved.

use nudge_core::TopicTag;

/// Result of classifying a message's topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicClassification {
    pub topic: TopicTag,
    /// Number of keyword hits for the winning topic.
    pub hits: usize,
}

const NUTRITION_KEYWORDS: &[&str] = &[
    "diet", "eat", "eating", "food", "meal", "protein", "calorie", "calories", "macros",
    "carbs", "nutrition", "snack", "breakfast", "dinner", "lunch", "supplement", "fasting",
];

const WORKOUT_KEYWORDS: &[&str] = &[
    "workout", "exercise", "training", "gym", "lift", "lifting", "squat", "deadlift",
    "bench", "cardio", "run", "running", "reps", "sets", "stretch", "routine", "sore",
];

const GOAL_KEYWORDS: &[&str] = &[
    "goal", "goals", "target", "lose weight", "weight loss", "gain muscle", "bulk", "cut",
    "plan", "progress", "motivation", "transform", "transformation", "by summer",
];

/// Keyword-based topic classifier.
pub struct TopicClassifier {
    /// Minimum keyword hits before a topic is considered identified.
    min_hits: usize,
}

impl TopicClassifier {
    pub fn new() -> Self {
        Self { min_hits: 1 }
    }

    pub fn with_min_hits(min_hits: usize) -> Self {
        Self {
            min_hits: min_hits.max(1),
        }
    }

    /// Classify `text`. Returns `None` when no topic clears the threshold or
    /// two topics tie for the lead.
    pub fn classify(&self, text: &str) -> Option<TopicClassification> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        let mut scores = [
            (TopicTag::NutritionHelp, Self::hits(&lower, &words, NUTRITION_KEYWORDS)),
            (TopicTag::WorkoutQuestions, Self::hits(&lower, &words, WORKOUT_KEYWORDS)),
            (TopicTag::GoalSetting, Self::hits(&lower, &words, GOAL_KEYWORDS)),
        ];
        scores.sort_by(|a, b| b.1.cmp(&a.1));

        let (topic, hits) = scores[0];
        if hits < self.min_hits || hits == scores[1].1 {
            return None;
        }
        Some(TopicClassification { topic, hits })
    }

    /// Single words match whole tokens; phrases match as substrings.
    fn hits(lower: &str, words: &[&str], keywords: &[&str]) -> usize {
        keywords
            .iter()
            .filter(|&&k| {
                if k.contains(' ') {
                    lower.contains(k)
                } else {
                    words.contains(&k)
                }
            })
            .count()
    }
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(text: &str) -> Option<TopicTag> {
        TopicClassifier::new().classify(text).map(|c| c.topic)
    }

    #[test]
    fn nutrition_question() {
        assert_eq!(
            topic("How much protein should I eat after dinner?"),
            Some(TopicTag::NutritionHelp)
        );
    }

    #[test]
    fn workout_question() {
        assert_eq!(
            topic("My squat form feels off, how many reps per set?"),
            Some(TopicTag::WorkoutQuestions)
        );
    }

    #[test]
    fn goal_phrase_matches_as_substring() {
        assert_eq!(
            topic("I want to lose weight by summer"),
            Some(TopicTag::GoalSetting)
        );
    }

    #[test]
    fn greeting_is_unclassified() {
        assert_eq!(topic("hey there!"), None);
        assert_eq!(topic(""), None);
    }

    #[test]
    fn tie_is_unclassified() {
        // one nutrition hit, one workout hit
        assert_eq!(topic("meal after gym?"), None);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        // "cutlery" must not count as "cut", "breadth" not "bread"
        assert_eq!(topic("new cutlery set"), None);
    }

    #[test]
    fn threshold_is_respected() {
        let strict = TopicClassifier::with_min_hits(2);
        assert!(strict.classify("protein").is_none());
        let result = strict.classify("protein with every meal").unwrap();
        assert_eq!(result.topic, TopicTag::NutritionHelp);
        assert_eq!(result.hits, 2);
    }
}
