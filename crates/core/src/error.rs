use crate::models::DocumentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("document has no extractable text to index")]
    EmptyDocument,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("cannot retrieve from an empty index")]
    EmptyIndex,

    #[error("invalid mode '{0}', use 'qa' or 'mcq'")]
    InvalidMode(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("question is empty")]
    EmptyQuestion,

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RagError {
    /// Whether the caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Generation(_) | RagError::Http(_))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("document {0} not found, ingest it first")]
    NotFound(DocumentId),

    #[error(transparent)]
    Rag(#[from] RagError),
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
