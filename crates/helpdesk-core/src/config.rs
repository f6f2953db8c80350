use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HelpdeskError, Result};

/// Top-level configuration for the Helpdesk service.
///
/// Loaded from `~/.helpdesk/config.toml` by default. Every scoring weight,
/// threshold and canned response the decision engine uses lives here so the
/// policy can be tuned without a rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub responses: ResponseConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl HelpdeskConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HelpdeskConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing,
    /// unparsable or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let ceiling = self.matcher.score_ceiling;
        if !ceiling.is_finite() || ceiling <= 0.0 {
            return Err(HelpdeskError::Config(format!(
                "matcher.score_ceiling must be a positive number, got {}",
                ceiling
            )));
        }

        let threshold = self.escalation.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HelpdeskError::Config(format!(
                "escalation.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self
            .escalation
            .escalation_phrases
            .iter()
            .any(|p| p.trim().is_empty())
        {
            return Err(HelpdeskError::Config(
                "escalation.escalation_phrases must not contain empty phrases".to_string(),
            ));
        }

        // Rule 2 counts earlier fallback replies by this marker, so the
        // fallback text has to carry it.
        let marker = &self.escalation.low_confidence_marker;
        if marker.is_empty() {
            return Err(HelpdeskError::Config(
                "escalation.low_confidence_marker must not be empty".to_string(),
            ));
        }
        if !self.responses.fallback.contains(marker.as_str()) {
            return Err(HelpdeskError::Config(format!(
                "responses.fallback must contain the low-confidence marker '{}'",
                marker
            )));
        }

        if self.conversation.history_limit == 0 {
            return Err(HelpdeskError::Config(
                "conversation.history_limit must be at least 1".to_string(),
            ));
        }
        if self.conversation.history_limit < self.escalation.low_confidence_window {
            warn!(
                history_limit = self.conversation.history_limit,
                window = self.escalation.low_confidence_window,
                "History fetch is smaller than the low-confidence window"
            );
        }

        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.helpdesk/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Require `Authorization: Bearer <token>` on non-public routes.
    pub require_auth: bool,
    /// Fixed bearer token. When unset and auth is required, a token is
    /// generated and stored in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            allowed_origins: vec!["*".to_string()],
            require_auth: false,
            api_token: None,
            body_limit_bytes: 64 * 1024,
        }
    }
}

/// FAQ scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Added when the whole query appears inside the FAQ question.
    pub phrase_weight: u32,
    /// Added for every FAQ keyword found inside the query.
    pub keyword_weight: u32,
    /// Added for every query word found in the question, answer or keywords.
    pub word_weight: u32,
    /// Query words shorter than this are ignored.
    pub min_word_len: usize,
    /// Score that maps to confidence 1.0; higher scores saturate.
    pub score_ceiling: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            phrase_weight: 10,
            keyword_weight: 5,
            word_weight: 1,
            min_word_len: 3,
            score_ceiling: 15.0,
        }
    }
}

/// Escalation policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Minimum confidence for an automatic FAQ answer.
    pub confidence_threshold: f64,
    /// Phrases that hand the conversation to a human on sight.
    pub escalation_phrases: Vec<String>,
    /// Substring identifying an earlier low-confidence fallback reply.
    pub low_confidence_marker: String,
    /// Number of most recent history turns inspected for fallback replies.
    pub low_confidence_window: usize,
    /// Fallback replies within the window that force escalation.
    pub low_confidence_limit: usize,
    /// Queries with more words than this count as complex.
    pub complex_word_limit: usize,
    /// Queries with more question marks than this count as complex.
    pub complex_question_limit: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            escalation_phrases: [
                "complaint",
                "angry",
                "upset",
                "frustrated",
                "terrible",
                "awful",
                "disappointed",
                "speak to manager",
                "human",
                "real person",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            low_confidence_marker: "not sure".to_string(),
            low_confidence_window: 4,
            low_confidence_limit: 2,
            complex_word_limit: 30,
            complex_question_limit: 2,
        }
    }
}

/// Canned reply texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub human_requested: String,
    pub repeated_low_confidence: String,
    pub complex_question: String,
    /// Prepended to an FAQ answer when the user moved on to a new question.
    pub context_prefix: String,
    /// Appended to every FAQ answer.
    pub closing_line: String,
    /// Reply when nothing matched well enough. Must contain
    /// `escalation.low_confidence_marker`.
    pub fallback: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            human_requested: "I understand you'd like to speak with a human representative. \
                Let me connect you with our support team who can better assist you with this matter."
                .to_string(),
            repeated_low_confidence: "I apologize, but I'm having difficulty providing the \
                information you need. Let me escalate this to our support team who can give you \
                more detailed assistance."
                .to_string(),
            complex_question: "Your question involves several topics that would be best \
                addressed by our support team. I'm escalating this conversation so a \
                representative can provide comprehensive assistance."
                .to_string(),
            context_prefix: "Based on your question, ".to_string(),
            closing_line: "\n\nIs there anything else I can help you with?".to_string(),
            fallback: "I'm not sure I fully understand your question. Could you please rephrase \
                it or provide more details? Alternatively, I can connect you with our support \
                team for more specific assistance."
                .to_string(),
        }
    }
}

/// Conversation handling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Most recent messages fetched as decision context.
    pub history_limit: usize,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// JSON file of FAQ entries loaded into the knowledge base at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faq_seed_path: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            max_message_length: 2000,
            faq_seed_path: None,
        }
    }
}
