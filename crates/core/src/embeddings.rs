use crate::error::RagError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Batch size used against remote embedding endpoints.
const HTTP_BATCH_SIZE: usize = 8;

/// Text to vector capability shared by index construction and querying.
///
/// Implementations must be deterministic for a given input, since the same
/// embedder encodes both the chunks and every later query.
pub trait Embedder {
    fn dimensions(&self) -> usize;

    /// Encodes each input text into one vector, preserving order.
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.encode(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("embedder returned no vector".to_string()))
    }
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        (**self).encode(texts)
    }
}

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Offline embedder hashing character trigrams into a fixed number of buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for ch in window {
                let mut buffer = [0u8; 4];
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:8080/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
    pub timeout: Duration,
}

/// Blocking client for OpenAI-compatible `/embeddings` endpoints.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, RagError> {
        if config.model.trim().is_empty() {
            return Err(RagError::Embedding("missing embedding model name".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            dimensions: config.dimensions,
        })
    }

    fn encode_batch(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: batch,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.trim());
        }

        let response = request
            .send()
            .map_err(|error| RagError::Embedding(format!("request to {} failed: {error}", self.endpoint)))?;
        if !response.status().is_success() {
            return Err(RagError::Embedding(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .map_err(|error| RagError::Embedding(format!("invalid embedding response: {error}")))?;
        if parsed.data.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "endpoint returned {} embeddings for {} inputs",
                parsed.data.len(),
                batch.len()
            )));
        }
        parsed.data.sort_by_key(|entry| entry.index);

        parsed
            .data
            .into_iter()
            .map(|entry| {
                if entry.embedding.len() != self.dimensions {
                    return Err(RagError::Embedding(format!(
                        "embedding dimension {} != {}",
                        entry.embedding.len(),
                        self.dimensions
                    )));
                }
                let mut vector = entry.embedding;
                l2_normalize(&mut vector);
                Ok(vector)
            })
            .collect()
    }
}

impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(HTTP_BATCH_SIZE) {
            vectors.extend(self.encode_batch(batch)?);
        }
        debug!(inputs = texts.len(), model = %self.model, "encoded texts remotely");
        Ok(vectors)
    }
}
