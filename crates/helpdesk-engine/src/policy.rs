//! Escalation policy: turns a match result and recent history into a verdict.
//!
//! Rules are evaluated in order and the first one that applies wins:
//!
//! 1. the query contains an escalation phrase ("human", "angry", ...);
//! 2. enough recent assistant replies were low-confidence fallbacks;
//! 3. the query looks complex (long, or many questions) and matched poorly;
//! 4. a confident FAQ match is answered directly;
//! 5. otherwise, a fallback asking the user to rephrase.

use std::fmt;

use helpdesk_core::config::{EscalationConfig, ResponseConfig};
use helpdesk_core::types::{EscalationReason, HistoryTurn, MatchResult, Role, Verdict};

/// The rule that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRule {
    EscalationPhrase,
    RepeatedLowConfidence,
    ComplexQuestion,
    FaqAnswer,
    Fallback,
}

impl DecisionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionRule::EscalationPhrase => "escalation_phrase",
            DecisionRule::RepeatedLowConfidence => "repeated_low_confidence",
            DecisionRule::ComplexQuestion => "complex_question",
            DecisionRule::FaqAnswer => "faq_answer",
            DecisionRule::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless rule chain deciding between answering and escalating.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    config: EscalationConfig,
    responses: ResponseConfig,
    /// Escalation phrases, lowercased once.
    phrases: Vec<String>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(EscalationConfig::default(), ResponseConfig::default())
    }
}

impl EscalationPolicy {
    pub fn new(config: EscalationConfig, responses: ResponseConfig) -> Self {
        let phrases = config
            .escalation_phrases
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        Self {
            config,
            responses,
            phrases,
        }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Decide the verdict for one turn.
    pub fn decide(&self, query: &str, matched: &MatchResult<'_>, history: &[HistoryTurn]) -> Verdict {
        self.evaluate(query, matched, history).1
    }

    /// Decide the verdict and report which rule fired.
    pub fn evaluate(
        &self,
        query: &str,
        matched: &MatchResult<'_>,
        history: &[HistoryTurn],
    ) -> (DecisionRule, Verdict) {
        let query_lower = query.to_lowercase();

        if self.requests_human(&query_lower) {
            return (
                DecisionRule::EscalationPhrase,
                Verdict::escalate(
                    self.responses.human_requested.clone(),
                    EscalationReason::HumanRequested,
                ),
            );
        }

        if self.low_confidence_replies(history) >= self.config.low_confidence_limit {
            return (
                DecisionRule::RepeatedLowConfidence,
                Verdict::escalate(
                    self.responses.repeated_low_confidence.clone(),
                    EscalationReason::RepeatedLowConfidence,
                ),
            );
        }

        let confident = matched.confidence >= self.config.confidence_threshold;

        if self.is_complex(query) && !confident {
            return (
                DecisionRule::ComplexQuestion,
                Verdict::escalate(
                    self.responses.complex_question.clone(),
                    EscalationReason::ComplexQuestion,
                ),
            );
        }

        if let Some(faq) = matched.faq.filter(|_| confident) {
            let prefix = if moved_on(&query_lower, history) {
                self.responses.context_prefix.as_str()
            } else {
                ""
            };
            return (
                DecisionRule::FaqAnswer,
                Verdict::answer(format!(
                    "{}{}{}",
                    prefix, faq.answer, self.responses.closing_line
                )),
            );
        }

        (
            DecisionRule::Fallback,
            Verdict::answer(self.responses.fallback.clone()),
        )
    }

    fn requests_human(&self, query_lower: &str) -> bool {
        self.phrases.iter().any(|p| query_lower.contains(p.as_str()))
    }

    /// Assistant fallback replies among the most recent window of turns.
    fn low_confidence_replies(&self, history: &[HistoryTurn]) -> usize {
        let marker = self.config.low_confidence_marker.as_str();
        history
            .iter()
            .rev()
            .take(self.config.low_confidence_window)
            .filter(|t| t.role == Role::Assistant && t.content.contains(marker))
            .count()
    }

    fn is_complex(&self, query: &str) -> bool {
        let words = query.split_whitespace().count();
        let questions = query.matches('?').count();
        words > self.config.complex_word_limit || questions > self.config.complex_question_limit
    }
}

/// Whether the latest earlier user turn differs from this query.
///
/// Only the single most recent user turn is compared. No user turn in the
/// history means there is nothing to continue from.
fn moved_on(query_lower: &str, history: &[HistoryTurn]) -> bool {
    history
        .iter()
        .rev()
        .find(|t| t.role == Role::User)
        .is_some_and(|t| t.content.to_lowercase() != query_lower)
}

// =============================================================================
// Tests
// =============================================================================
