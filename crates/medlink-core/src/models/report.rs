//! Medical report summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A summarized report. Text extraction and summarization happen upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub summary: String,
    pub extracted_text: String,
    #[serde(default)]
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(summary: String, extracted_text: String) -> Self {
        Self {
            summary,
            extracted_text,
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
