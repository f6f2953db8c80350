//! FAQ matcher.
//!
//! Scores every knowledge-base entry against a free-text query with three
//! additive, case-insensitive signals and keeps the highest scoring entry:
//!
//! - whole-query containment in the FAQ question (`phrase_weight`),
//! - each FAQ keyword contained in the query (`keyword_weight` per keyword),
//! - each query word found in the question, answer or any keyword
//!   (`word_weight` per word, at most once per word).
//!
//! The winning score is normalized against `score_ceiling` and saturates at 1.

use helpdesk_core::config::MatcherConfig;
use helpdesk_core::types::{FaqEntry, MatchResult};

/// Keyword/phrase scorer over a set of FAQ entries.
#[derive(Debug, Clone)]
pub struct FaqMatcher {
    config: MatcherConfig,
}

impl Default for FaqMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl FaqMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Return the best matching entry for `query`.
    ///
    /// Ties keep the entry scanned first. An entry is only selected with a
    /// strictly positive score; otherwise the result is empty with
    /// confidence 0.
    pub fn find_best<'a>(&self, query: &str, faqs: &'a [FaqEntry]) -> MatchResult<'a> {
        let prepared = PreparedQuery::new(query, self.config.min_word_len);

        let mut best: Option<&'a FaqEntry> = None;
        let mut best_score = 0u32;

        for faq in faqs {
            let score = self.score_prepared(&prepared, faq);
            if score > best_score {
                best_score = score;
                best = Some(faq);
            }
        }

        MatchResult {
            faq: best,
            score: best_score,
            confidence: self.confidence(best_score),
        }
    }

    /// Raw score of a single entry.
    pub fn score(&self, query: &str, faq: &FaqEntry) -> u32 {
        let prepared = PreparedQuery::new(query, self.config.min_word_len);
        self.score_prepared(&prepared, faq)
    }

    /// Map a raw score into `[0, 1]`.
    pub fn confidence(&self, score: u32) -> f64 {
        (f64::from(score) / self.config.score_ceiling).clamp(0.0, 1.0)
    }

    fn score_prepared(&self, query: &PreparedQuery, faq: &FaqEntry) -> u32 {
        let question = faq.question.to_lowercase();
        let answer = faq.answer.to_lowercase();
        // An empty keyword would be "contained" in every query.
        let keywords: Vec<String> = faq
            .keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| k.to_lowercase())
            .collect();

        let mut score = 0u32;

        if query.has_content() && question.contains(query.lowered.as_str()) {
            score = score.saturating_add(self.config.phrase_weight);
        }

        for keyword in &keywords {
            if query.lowered.contains(keyword.as_str()) {
                score = score.saturating_add(self.config.keyword_weight);
            }
        }

        for word in &query.words {
            let word = word.as_str();
            let found = question.contains(word)
                || answer.contains(word)
                || keywords.iter().any(|k| k.contains(word));
            if found {
                score = score.saturating_add(self.config.word_weight);
            }
        }

        score
    }
}

/// Lowercased query plus its significant words, computed once per search.
struct PreparedQuery {
    lowered: String,
    words: Vec<String>,
}

impl PreparedQuery {
    fn new(query: &str, min_word_len: usize) -> Self {
        let lowered = query.to_lowercase();
        let words = lowered
            .split_whitespace()
            .filter(|w| w.chars().count() >= min_word_len)
            .map(str::to_string)
            .collect();
        Self { lowered, words }
    }

    fn has_content(&self) -> bool {
        !self.lowered.trim().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
