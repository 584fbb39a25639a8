pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod retriever;
pub mod session;

pub use chunking::{chunk_pages, normalize_text, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, HttpEmbedderConfig,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{RagError, SessionError};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use generation::{
    format_chat_prompt, strip_prompt_echo, Generator, HttpGenerator, HttpGeneratorConfig,
};
pub use index::{build_index, FlatIndex, Neighbor, VectorIndex};
pub use ingest::{digest_file, load_pdf, LoadedDocument};
pub use models::{
    Answer, Chunk, DocumentId, DocumentMetadata, GenerationMode, GenerationParams, Health,
    IngestOutcome, RagOptions, Retrieval,
};
pub use orchestrator::QaCoordinator;
pub use prompts::{answer_prompt, clean_qa_output, content_prompt, sample_text};
pub use retriever::retrieve;
pub use session::{DocumentSession, SessionStore, DEFAULT_SESSION_CAPACITY};
