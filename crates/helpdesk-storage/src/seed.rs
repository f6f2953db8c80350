//! Knowledge base seeding from JSON.
//!
//! A seed file is a JSON array of entries:
//!
//! ```json
//! [{ "question": "...", "answer": "...", "category": "billing", "keywords": ["refund"] }]
//! ```
//!
//! `id` is optional and generated when missing; `category` defaults to
//! `general` and `keywords` to an empty list.

use std::path::Path;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::FaqEntry;

use crate::store::SqliteConversationStore;

/// Sample knowledge base shipped with the service.
pub const DEFAULT_FAQS_JSON: &str = include_str!("../seed/faqs.json");

#[derive(Debug, Deserialize)]
struct SeedEntry {
    #[serde(default)]
    id: Option<Uuid>,
    question: String,
    answer: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    keywords: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

/// Parse seed JSON into FAQ entries.
pub fn parse_seed(json: &str) -> Result<Vec<FaqEntry>> {
    let entries: Vec<SeedEntry> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.question.trim().is_empty() || entry.answer.trim().is_empty() {
                return Err(HelpdeskError::Validation(format!(
                    "seed entry {} needs a question and an answer",
                    index
                )));
            }
            Ok(FaqEntry {
                id: entry.id.unwrap_or_else(Uuid::new_v4),
                question: entry.question,
                answer: entry.answer,
                category: entry.category,
                keywords: entry
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
        })
        .collect()
}

/// Read and parse a seed file.
pub fn load_seed_file(path: &Path) -> Result<Vec<FaqEntry>> {
    let content = std::fs::read_to_string(path)?;
    parse_seed(&content)
}

/// Replace the knowledge base with the entries in `path`.
pub fn seed_from_file(store: &SqliteConversationStore, path: &Path) -> Result<usize> {
    let faqs = load_seed_file(path)?;
    store.replace_faqs(&faqs)?;
    info!(count = faqs.len(), "Knowledge base seeded from {}", path.display());
    Ok(faqs.len())
}

/// Load the bundled sample FAQs when the knowledge base is empty.
///
/// Returns the number of entries inserted.
pub fn seed_defaults_if_empty(store: &SqliteConversationStore) -> Result<usize> {
    if store.faq_count()? > 0 {
        return Ok(0);
    }
    let faqs = parse_seed(DEFAULT_FAQS_JSON)?;
    store.replace_faqs(&faqs)?;
    info!(count = faqs.len(), "Knowledge base seeded with sample FAQs");
    Ok(faqs.len())
}
