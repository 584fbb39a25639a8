use crate::embeddings::{l2_normalize, Embedder};
use crate::error::RagError;
use crate::index::VectorIndex;
use crate::models::{Chunk, Retrieval};
use tracing::debug;

/// Returns the `k` chunks most similar to `query`, best first.
///
/// `embedder` must be the one the index was built with. `k` is clamped to the
/// number of chunks, and slots the index reports as unfilled are skipped.
pub fn retrieve<E, I>(
    embedder: &E,
    query: &str,
    index: &I,
    chunks: &[Chunk],
    k: usize,
) -> Result<Vec<Retrieval>, RagError>
where
    E: Embedder + ?Sized,
    I: VectorIndex + ?Sized,
{
    if chunks.is_empty() {
        return Err(RagError::EmptyIndex);
    }

    let mut query_vector = embedder.embed_one(query)?;
    if query_vector.len() != index.dimensions() {
        return Err(RagError::Embedding(format!(
            "query dimension {} != index dimension {}",
            query_vector.len(),
            index.dimensions()
        )));
    }
    l2_normalize(&mut query_vector);

    let k = k.min(chunks.len());
    let retrievals: Vec<Retrieval> = index
        .search(&query_vector, k)
        .into_iter()
        .filter_map(|neighbor| {
            let chunk = chunks.get(neighbor.position?)?;
            Some(Retrieval {
                chunk: chunk.clone(),
                score: neighbor.score,
            })
        })
        .collect();

    debug!(k, hits = retrievals.len(), "retrieved chunks");
    Ok(retrievals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk_pages, ChunkingConfig};
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::index::{build_index, FlatIndex, Neighbor};

    fn document() -> (CharacterNgramEmbedder, FlatIndex, Vec<Chunk>) {
        let pages = [
            "The hydraulic pump raises pressure in the main circuit.",
            "Electrical wiring diagrams show the relay and fuse layout.",
            "Lubricate the bearings every five hundred operating hours.",
            "The pressure relief valve protects the hydraulic circuit.",
        ];
        let chunks = chunk_pages(&pages, ChunkingConfig::default()).unwrap();
        let embedder = CharacterNgramEmbedder::default();
        let (index, _) = build_index(&embedder, &chunks).unwrap();
        (embedder, index, chunks)
    }

    #[test]
    fn results_are_ranked_and_deterministic() {
        let (embedder, index, chunks) = document();
        let first = retrieve(&embedder, "hydraulic pressure circuit", &index, &chunks, 3).unwrap();
        let second = retrieve(&embedder, "hydraulic pressure circuit", &index, &chunks, 3).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(first[0].chunk.text.contains("hydraulic"));
    }

    #[test]
    fn k_is_clamped_to_chunk_count() {
        let (embedder, index, chunks) = document();
        let results = retrieve(&embedder, "bearings", &index, &chunks, 50).unwrap();
        assert_eq!(results.len(), chunks.len());
    }

    #[test]
    fn single_chunk_document_returns_that_chunk() {
        let embedder = CharacterNgramEmbedder::default();
        let chunks = chunk_pages(&["only one short page"], ChunkingConfig::default()).unwrap();
        let (index, _) = build_index(&embedder, &chunks).unwrap();

        let results = retrieve(&embedder, "page", &index, &chunks, 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk, chunks[0]);
    }

    #[test]
    fn empty_chunks_fail() {
        let embedder = CharacterNgramEmbedder::default();
        let index = FlatIndex::new(embedder.dimensions);
        assert!(matches!(
            retrieve(&embedder, "anything", &index, &[], 3),
            Err(RagError::EmptyIndex)
        ));
    }

    #[test]
    fn query_dimension_must_match_index() {
        let (_, index, chunks) = document();
        let other = CharacterNgramEmbedder { dimensions: 16 };
        assert!(matches!(
            retrieve(&other, "pump", &index, &chunks, 3),
            Err(RagError::Embedding(_))
        ));
    }

    struct SparseIndex;

    impl VectorIndex for SparseIndex {
        fn dimensions(&self) -> usize {
            CharacterNgramEmbedder::default().dimensions
        }

        fn len(&self) -> usize {
            2
        }

        fn search(&self, _query: &[f32], _k: usize) -> Vec<Neighbor> {
            vec![
                Neighbor {
                    position: Some(1),
                    score: 0.9,
                },
                Neighbor {
                    position: None,
                    score: 0.0,
                },
                Neighbor {
                    position: Some(7),
                    score: 0.0,
                },
            ]
        }
    }

    #[test]
    fn unfilled_and_unknown_slots_are_skipped() {
        let embedder = CharacterNgramEmbedder::default();
        let chunks = chunk_pages(&["first page", "second page"], ChunkingConfig::default()).unwrap();

        let results = retrieve(&embedder, "second", &SparseIndex, &chunks, 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.page, 2);
    }
}
