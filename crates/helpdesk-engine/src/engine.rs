//! Decision engine: one pure function per turn.
//!
//! `(query, faqs, history) -> outcome`, with no I/O and no state between
//! calls. The service layer owns persistence.

use tracing::debug;
use uuid::Uuid;

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::types::{FaqEntry, HistoryTurn, MessageMetadata, Verdict};

use crate::matcher::FaqMatcher;
use crate::policy::{DecisionRule, EscalationPolicy};

/// Everything the engine decided for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub verdict: Verdict,
    pub rule: DecisionRule,
    /// Raw score of the best entry, 0 when nothing matched.
    pub score: u32,
    pub confidence: f64,
    pub matched_faq_id: Option<Uuid>,
    pub matched_faq_category: Option<String>,
}

impl TurnOutcome {
    /// Diagnostics stored with the assistant reply.
    pub fn metadata(&self) -> MessageMetadata {
        MessageMetadata {
            confidence: self.confidence,
            matched_faq_id: self.matched_faq_id,
            matched_faq_category: self.matched_faq_category.clone(),
        }
    }
}

/// Matcher plus escalation policy.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    matcher: FaqMatcher,
    policy: EscalationPolicy,
}

impl DecisionEngine {
    pub fn new(matcher: FaqMatcher, policy: EscalationPolicy) -> Self {
        Self { matcher, policy }
    }

    pub fn from_config(config: &HelpdeskConfig) -> Self {
        Self::new(
            FaqMatcher::new(config.matcher.clone()),
            EscalationPolicy::new(config.escalation.clone(), config.responses.clone()),
        )
    }

    pub fn matcher(&self) -> &FaqMatcher {
        &self.matcher
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Match `query` against `faqs` and decide the reply.
    ///
    /// `history` holds the turns before this query, oldest first.
    pub fn evaluate(&self, query: &str, faqs: &[FaqEntry], history: &[HistoryTurn]) -> TurnOutcome {
        let matched = self.matcher.find_best(query, faqs);
        let (rule, verdict) = self.policy.evaluate(query, &matched, history);

        debug!(
            rule = %rule,
            score = matched.score,
            confidence = matched.confidence,
            escalate = verdict.escalate,
            faqs = faqs.len(),
            history = history.len(),
            "Turn evaluated"
        );

        TurnOutcome {
            verdict,
            rule,
            score: matched.score,
            confidence: matched.confidence,
            matched_faq_id: matched.faq.map(|f| f.id),
            matched_faq_category: matched.faq.map(|f| f.category.clone()),
        }
    }

    /// Shorthand for the verdict alone.
    pub fn decide(&self, query: &str, faqs: &[FaqEntry], history: &[HistoryTurn]) -> Verdict {
        self.evaluate(query, faqs, history).verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::types::EscalationReason;

    fn kb() -> Vec<FaqEntry> {
        vec![
            FaqEntry::new(
                "What are your business hours?",
                "We are open Monday to Friday, 9am to 5pm.",
                "general",
                vec!["hours".to_string(), "open".to_string()],
            ),
            FaqEntry::new(
                "How do I request a refund?",
                "Refunds can be requested within 30 days from your orders page.",
                "billing",
                vec!["refund".to_string(), "money back".to_string()],
            ),
        ]
    }

    #[test]
    fn test_evaluate_confident_answer() {
        let faqs = kb();
        let outcome = DecisionEngine::default().evaluate("what are your hours", &faqs, &[]);
        assert_eq!(outcome.rule, DecisionRule::FaqAnswer);
        assert_eq!(outcome.score, 9);
        assert!((outcome.confidence - 0.6).abs() < 1e-9);
        assert_eq!(outcome.matched_faq_id, Some(faqs[0].id));
        assert_eq!(outcome.matched_faq_category.as_deref(), Some("general"));
        assert!(outcome.verdict.response.starts_with("We are open"));
    }

    #[test]
    fn test_evaluate_escalation_still_reports_match() {
        let faqs = kb();
        let outcome =
            DecisionEngine::default().evaluate("I am angry about my refund", &faqs, &[]);
        assert!(outcome.verdict.escalate);
        assert_eq!(outcome.verdict.reason, Some(EscalationReason::HumanRequested));
        assert_eq!(outcome.matched_faq_id, Some(faqs[1].id));
    }

    #[test]
    fn test_evaluate_empty_knowledge_base_falls_back() {
        let outcome = DecisionEngine::default().evaluate("what are your hours", &[], &[]);
        assert_eq!(outcome.rule, DecisionRule::Fallback);
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.matched_faq_id.is_none());
    }

    #[test]
    fn test_metadata_mirrors_outcome() {
        let faqs = kb();
        let outcome = DecisionEngine::default().evaluate("refund", &faqs, &[]);
        let meta = outcome.metadata();
        assert_eq!(meta.confidence, outcome.confidence);
        assert_eq!(meta.matched_faq_id, Some(faqs[1].id));
        assert_eq!(meta.matched_faq_category.as_deref(), Some("billing"));
    }

    #[test]
    fn test_from_config_applies_thresholds() {
        let mut config = HelpdeskConfig::default();
        config.escalation.confidence_threshold = 0.9;
        let engine = DecisionEngine::from_config(&config);
        let faqs = kb();
        let outcome = engine.evaluate("what are your hours", &faqs, &[]);
        assert_eq!(outcome.rule, DecisionRule::Fallback);
    }

    #[test]
    fn test_decide_matches_evaluate() {
        let faqs = kb();
        let engine = DecisionEngine::default();
        let history = vec![HistoryTurn::user("hello")];
        assert_eq!(
            engine.decide("refund please", &faqs, &history),
            engine.evaluate("refund please", &faqs, &history).verdict
        );
    }
}
