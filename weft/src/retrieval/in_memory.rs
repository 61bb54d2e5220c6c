//! In-memory vector store for semantic search.
//!
//! Cosine similarity over embedded chunks. Not persistent; used by tests and
//! as the default local backend.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{DocumentChunk, RetrieverError, SearchFilter, VectorStore};

struct StoredChunk {
    chunk: DocumentChunk,
    owner_id: Option<String>,
    vector: Vec<f32>,
}

/// Pure in-memory vector store.
///
/// **Interaction**: Used as `Arc<dyn VectorStore>` by the retriever; tests
/// seed it with pre-embedded chunks.
#[derive(Default)]
pub struct InMemoryVectorStore {
    data: DashMap<String, StoredChunk>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one chunk with its embedding.
    pub fn add_chunk(&self, chunk: DocumentChunk, owner_id: Option<String>, vector: Vec<f32>) {
        let key = format!("{}:{}", chunk.document_id, chunk.chunk_index);
        self.data.insert(
            key,
            StoredChunk {
                chunk,
                owner_id,
                vector,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns 0.0 when either vector has zero magnitude.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<(DocumentChunk, f32)>, RetrieverError> {
        let mut scored: Vec<(DocumentChunk, f32)> = self
            .data
            .iter()
            .filter(|entry| {
                filter.accepts(entry.owner_id.as_deref(), &entry.chunk.document_id)
            })
            .map(|entry| {
                let score = Self::cosine_similarity(query_embedding, &entry.vector);
                (entry.chunk.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(document_id: &str, index: u32, content: &str) -> DocumentChunk {
        DocumentChunk {
            document_id: document_id.into(),
            chunk_index: index,
            content: content.into(),
        }
    }

    /// **Scenario**: Search ranks by cosine similarity and truncates to k.
    #[tokio::test]
    async fn search_ranks_and_truncates() {
        let store = InMemoryVectorStore::new();
        store.add_chunk(chunk("doc_1", 0, "a"), None, vec![1.0, 0.0]);
        store.add_chunk(chunk("doc_2", 0, "b"), None, vec![0.7, 0.7]);
        store.add_chunk(chunk("doc_3", 0, "c"), None, vec![0.0, 1.0]);

        let hits = store
            .search_similar(&[1.0, 0.0], 2, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.document_id, "doc_1");
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].0.document_id, "doc_2");
    }

    /// **Scenario**: The filter excludes other owners and other documents.
    #[tokio::test]
    async fn search_applies_filter() {
        let store = InMemoryVectorStore::new();
        store.add_chunk(chunk("doc_1", 0, "mine"), Some("user-1".into()), vec![1.0]);
        store.add_chunk(chunk("doc_2", 0, "theirs"), Some("user-2".into()), vec![1.0]);

        let filter = SearchFilter {
            user_id: Some("user-1".into()),
            document_ids: None,
        };
        let hits = store.search_similar(&[1.0], 10, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.content, "mine");
    }

    /// **Scenario**: A zero query vector scores 0 against everything.
    #[tokio::test]
    async fn zero_vector_scores_zero() {
        let store = InMemoryVectorStore::new();
        store.add_chunk(chunk("doc_1", 0, "a"), None, vec![1.0, 1.0]);
        let hits = store
            .search_similar(&[0.0, 0.0], 1, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].1, 0.0);
    }
}
