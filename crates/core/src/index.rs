use crate::embeddings::{l2_normalize, Embedder};
use crate::error::RagError;
use crate::models::Chunk;
use std::cmp::Ordering;
use tracing::{debug, info};

/// One nearest-neighbour slot returned by a [`VectorIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Ordinal of the matched vector, `None` for an unfilled slot.
    pub position: Option<usize>,
    pub score: f32,
}

/// Read-only inner-product search over unit vectors.
pub trait VectorIndex {
    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns at most `k` neighbours, best score first, ties by lowest position.
    fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor>;
}

/// Exhaustive inner-product index with vectors stored contiguously.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
        }
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<(), RagError> {
        if vector.len() != self.dimensions {
            return Err(RagError::Embedding(format!(
                "vector dimension {} != index dimension {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimensions.max(1))
    }
}

impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.data.len() / self.dimensions
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors()
            .map(|vector| vector.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();

        scored.sort_by(|left, right| match right.1.total_cmp(&left.1) {
            Ordering::Equal => left.0.cmp(&right.0),
            other => other,
        });

        scored
            .into_iter()
            .take(k)
            .map(|(position, score)| Neighbor {
                position: Some(position),
                score,
            })
            .collect()
    }
}

/// Encodes every chunk and builds an inner-product index over the results.
///
/// Vectors are re-normalized so inner product equals cosine similarity
/// regardless of what the embedder hands back. The normalized vectors are
/// returned alongside the index in chunk order.
pub fn build_index<E: Embedder + ?Sized>(
    embedder: &E,
    chunks: &[Chunk],
) -> Result<(FlatIndex, Vec<Vec<f32>>), RagError> {
    if chunks.is_empty() {
        return Err(RagError::EmptyDocument);
    }

    let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
    let mut embeddings = embedder.encode(&texts)?;

    if embeddings.len() != chunks.len() {
        return Err(RagError::Embedding(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    let dimensions = embeddings[0].len();
    if dimensions == 0 {
        return Err(RagError::Embedding(
            "embedder returned zero-dimension vectors".to_string(),
        ));
    }

    let mut index = FlatIndex::new(dimensions);
    for (position, embedding) in embeddings.iter_mut().enumerate() {
        if embedding.len() != dimensions {
            return Err(RagError::Embedding(format!(
                "chunk {position} has dimension {} but the first chunk has {dimensions}",
                embedding.len()
            )));
        }
        l2_normalize(embedding);
        index.add(embedding)?;
    }

    debug!(dimensions, "embedded chunks");
    info!(vectors = index.len(), "built vector index");
    Ok((index, embeddings))
}
