//! Property-based tests for the matcher and escalation policy
//!
//! Invariants checked:
//! - confidence is always within [0, 1]
//! - confidence is zero exactly when no entry is selected
//! - confidence never decreases as the score grows
//! - matching and deciding are deterministic
//! - escalation phrases always escalate, whatever else the query says

use helpdesk_core::types::{EscalationReason, FaqEntry, HistoryTurn, Role};
use proptest::prelude::*;

use crate::engine::DecisionEngine;
use crate::matcher::FaqMatcher;
use crate::policy::EscalationPolicy;

// ============================================================================
// Strategies
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z ?!.,']{0,80}"
}

fn arb_faq() -> impl Strategy<Value = FaqEntry> {
    (
        "[a-zA-Z ?]{1,60}",
        "[a-zA-Z .]{0,120}",
        prop_oneof![Just("general"), Just("billing"), Just("shipping")],
        prop::collection::vec("[a-z ]{0,12}", 0..5),
    )
        .prop_map(|(question, answer, category, keywords)| {
            FaqEntry::new(question, answer, category, keywords)
        })
}

fn arb_turn() -> impl Strategy<Value = HistoryTurn> {
    (
        prop_oneof![Just(Role::User), Just(Role::Assistant), Just(Role::System)],
        prop_oneof![
            arb_text(),
            Just("I'm not sure I fully understand your question.".to_string()),
        ],
    )
        .prop_map(|(role, content)| HistoryTurn::new(role, content))
}

// ============================================================================
// Matcher
// ============================================================================

proptest! {
    #[test]
    fn prop_confidence_is_bounded(
        query in arb_text(),
        faqs in prop::collection::vec(arb_faq(), 0..8),
    ) {
        let result = FaqMatcher::default().find_best(&query, &faqs);
        prop_assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn prop_zero_confidence_iff_no_match(
        query in arb_text(),
        faqs in prop::collection::vec(arb_faq(), 0..8),
    ) {
        let result = FaqMatcher::default().find_best(&query, &faqs);
        prop_assert_eq!(result.confidence == 0.0, result.faq.is_none());
        prop_assert_eq!(result.score == 0, result.faq.is_none());
    }

    #[test]
    fn prop_selected_entry_has_best_score(
        query in arb_text(),
        faqs in prop::collection::vec(arb_faq(), 1..8),
    ) {
        let matcher = FaqMatcher::default();
        let result = matcher.find_best(&query, &faqs);
        let max = faqs.iter().map(|f| matcher.score(&query, f)).max().unwrap_or(0);
        prop_assert_eq!(result.score, max);
        if let Some(selected) = result.faq {
            // First entry reaching the maximum.
            let first = faqs.iter().find(|f| matcher.score(&query, f) == max).unwrap();
            prop_assert_eq!(selected.id, first.id);
        }
    }

    #[test]
    fn prop_confidence_is_monotonic(a in 0u32..100, b in 0u32..100) {
        let matcher = FaqMatcher::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(matcher.confidence(low) <= matcher.confidence(high));
    }

    #[test]
    fn prop_matching_is_deterministic(
        query in arb_text(),
        faqs in prop::collection::vec(arb_faq(), 0..8),
    ) {
        let matcher = FaqMatcher::default();
        prop_assert_eq!(matcher.find_best(&query, &faqs), matcher.find_best(&query, &faqs));
    }
}

// ============================================================================
// Policy and engine
// ============================================================================

proptest! {
    #[test]
    fn prop_escalation_phrase_always_escalates(
        prefix in arb_text(),
        suffix in arb_text(),
        phrase in prop_oneof![Just("human"), Just("ANGRY"), Just("Real Person")],
        history in prop::collection::vec(arb_turn(), 0..10),
        faqs in prop::collection::vec(arb_faq(), 0..5),
    ) {
        let query = format!("{} {} {}", prefix, phrase, suffix);
        let verdict = DecisionEngine::default().decide(&query, &faqs, &history);
        prop_assert!(verdict.escalate);
        prop_assert_eq!(verdict.reason, Some(EscalationReason::HumanRequested));
    }

    #[test]
    fn prop_escalate_flag_matches_reason(
        query in arb_text(),
        history in prop::collection::vec(arb_turn(), 0..10),
        faqs in prop::collection::vec(arb_faq(), 0..5),
    ) {
        let verdict = DecisionEngine::default().decide(&query, &faqs, &history);
        prop_assert_eq!(verdict.escalate, verdict.reason.is_some());
        prop_assert!(!verdict.response.is_empty());
    }

    #[test]
    fn prop_decision_is_deterministic(
        query in arb_text(),
        history in prop::collection::vec(arb_turn(), 0..10),
        faqs in prop::collection::vec(arb_faq(), 0..5),
    ) {
        let engine = DecisionEngine::default();
        prop_assert_eq!(
            engine.evaluate(&query, &faqs, &history),
            engine.evaluate(&query, &faqs, &history)
        );
    }

    #[test]
    fn prop_only_window_turns_matter_for_repeated_failures(
        query in "[a-z]{3,10}",
        older in prop::collection::vec(arb_turn(), 0..6),
    ) {
        // Four clean recent turns hide any fallback replies further back.
        let mut history = older;
        history.extend([
            HistoryTurn::user("a"),
            HistoryTurn::assistant("Sure."),
            HistoryTurn::user("b"),
            HistoryTurn::assistant("Done."),
        ]);
        let policy = EscalationPolicy::default();
        let matcher = FaqMatcher::default();
        let verdict = policy.decide(&query, &matcher.find_best(&query, &[]), &history);
        prop_assert_ne!(verdict.reason, Some(EscalationReason::RepeatedLowConfidence));
    }
}
