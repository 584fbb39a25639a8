use crate::error::RagError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier handed out when a document is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// A window of words taken from a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    /// 1-indexed source page.
    pub page: u32,
    pub text: String,
    pub word_count: usize,
    pub char_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Qa,
    Mcq,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Qa => "qa",
            GenerationMode::Mcq => "mcq",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "qa" => Ok(GenerationMode::Qa),
            "mcq" => Ok(GenerationMode::Mcq),
            _ => Err(RagError::InvalidMode(value.to_string())),
        }
    }
}

/// Sampling parameters forwarded to the generation capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerationParams {
    pub const CONTENT: Self = Self {
        max_tokens: 800,
        temperature: 0.2,
    };

    pub const ANSWER: Self = Self {
        max_tokens: 250,
        temperature: 0.2,
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    /// SHA-256 of the source file, when the document came from disk.
    pub checksum: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl DocumentMetadata {
    pub fn now() -> Self {
        Self {
            title: None,
            checksum: None,
            ingested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub document_id: DocumentId,
    pub message: String,
    pub generated_content: String,
    pub page_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Retrieval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub models_loaded: bool,
    pub sessions: usize,
    pub embedding_dimensions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagOptions {
    pub window_size: usize,
    pub overlap: usize,
    /// Leading chunks sampled for Q/A and MCQ generation.
    pub sample_chunks: usize,
    pub max_sample_chars: usize,
    pub top_k: usize,
    /// Retrievals scoring below this are dropped. `None` keeps every hit.
    pub min_score: Option<f32>,
    pub content_params: GenerationParams,
    pub answer_params: GenerationParams,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            window_size: 180,
            overlap: 30,
            sample_chunks: 5,
            max_sample_chars: 3_000,
            top_k: 3,
            min_score: None,
            content_params: GenerationParams::CONTENT,
            answer_params: GenerationParams::ANSWER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("QA".parse::<GenerationMode>().unwrap(), GenerationMode::Qa);
        assert_eq!(" mcq ".parse::<GenerationMode>().unwrap(), GenerationMode::Mcq);
    }

    #[test]
    fn unknown_mode_is_descriptive_error() {
        let error = "essay".parse::<GenerationMode>().unwrap_err();
        assert!(matches!(error, RagError::InvalidMode(ref mode) if mode == "essay"));
        assert_eq!(error.to_string(), "invalid mode 'essay', use 'qa' or 'mcq'");
    }

    #[test]
    fn document_id_round_trips_through_display() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<DocumentId>().is_err());
    }
}
