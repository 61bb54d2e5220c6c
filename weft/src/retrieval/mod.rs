//! Retrieval: embeds a query and searches a vector store for relevant
//! documents.
//!
//! The [`Retriever`] adapts the two collaborator traits,
//! [`EmbeddingProvider`] and [`VectorStore`], into one query-to-documents
//! callable that the retrieval node invokes. A retriever built without an
//! embedding provider is a noop that returns no documents and logs a warning
//! once at construction.
//!
//! # Main types
//!
//! - [`Retriever`]: the adapter; construction fixes user/document filters,
//!   `k`, and the score threshold.
//! - [`Document`]: `page_content` plus metadata (`document_id`,
//!   `chunk_index`, `score`).
//! - [`VectorStore`] / [`EmbeddingProvider`]: collaborator contracts.
//! - [`InMemoryVectorStore`]: cosine-similarity store for tests and local
//!   backends.

mod embedder;
mod in_memory;

pub use embedder::{EmbeddingProvider, MockEmbedder};
pub use in_memory::InMemoryVectorStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Error from embedding or vector search. Non-fatal at the retrieval node:
/// the executor catches it, clears the retrieval context, and continues.
#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector search failed: {0}")]
    Search(String),
}

/// A retrieved document: content plus provenance metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One stored chunk of a source document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: String,
    pub chunk_index: u32,
    pub content: String,
}

/// Search predicate: both fields AND together when present.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub user_id: Option<String>,
    pub document_ids: Option<Vec<String>>,
}

impl SearchFilter {
    /// True when the chunk's owner/document survive both predicates.
    pub fn accepts(&self, owner_id: Option<&str>, document_id: &str) -> bool {
        if let Some(ref user) = self.user_id {
            if owner_id != Some(user.as_str()) {
                return false;
            }
        }
        if let Some(ref ids) = self.document_ids {
            if !ids.iter().any(|id| id == document_id) {
                return false;
            }
        }
        true
    }
}

/// Vector store collaborator: similarity search over embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns up to `k` `(chunk, score)` pairs ordered by descending score.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<(DocumentChunk, f32)>, RetrieverError>;
}

/// Query→documents adapter over an embedding provider and a vector store.
///
/// **Interaction**: Built by the engine per execution; called by the
/// retrieval node executor with the node's query.
pub struct Retriever {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Arc<dyn VectorStore>,
    filter: SearchFilter,
    collection_name: String,
    k: usize,
    score_threshold: f32,
}

impl Retriever {
    pub fn new(
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        store: Arc<dyn VectorStore>,
        user_id: Option<String>,
        document_ids: Option<Vec<String>>,
        collection_name: impl Into<String>,
        k: usize,
        score_threshold: f32,
    ) -> Self {
        if embedder.is_none() {
            warn!("no embedding provider configured; retriever will return no documents");
        }
        Self {
            embedder,
            store,
            filter: SearchFilter {
                user_id,
                document_ids,
            },
            collection_name: collection_name.into(),
            k,
            score_threshold,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Embeds the query, searches, drops results below the score threshold,
    /// and maps the survivors to documents. `k_override` caps the result
    /// count below the construction-time `k` when given.
    pub async fn retrieve(
        &self,
        query: &str,
        k_override: Option<usize>,
    ) -> Result<Vec<Document>, RetrieverError> {
        let Some(ref embedder) = self.embedder else {
            return Ok(vec![]);
        };
        let k = k_override.unwrap_or(self.k);
        if k == 0 {
            return Ok(vec![]);
        }
        let embedding = embedder.embed(query).await?;
        let hits = self.store.search_similar(&embedding, k, &self.filter).await?;
        let documents = hits
            .into_iter()
            .filter(|(_, score)| *score >= self.score_threshold)
            .map(|(chunk, score)| {
                let mut metadata = Map::new();
                metadata.insert("document_id".into(), Value::from(chunk.document_id));
                metadata.insert("chunk_index".into(), Value::from(chunk.chunk_index));
                metadata.insert("score".into(), Value::from(score as f64));
                Document {
                    page_content: chunk.content,
                    metadata,
                }
            })
            .collect();
        Ok(documents)
    }
}
