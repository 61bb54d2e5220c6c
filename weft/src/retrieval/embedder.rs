//! Embedding provider trait. Used to produce a vector from query text.
//!
//! Implementations can wrap OpenAI, local models, or the deterministic mock
//! used in tests.

use async_trait::async_trait;

use super::RetrieverError;

/// Produces a fixed-size float vector from text.
///
/// Implementations must be `Send + Sync` for use from async node executors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds the text into a vector of dimension [`EmbeddingProvider::dimension`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrieverError>;

    /// Vector dimension returned by [`EmbeddingProvider::embed`].
    fn dimension(&self) -> usize;
}

/// Deterministic embedder for tests: hashes character n-grams into a fixed
/// number of buckets and L2-normalizes. Similar strings land near each other
/// often enough for threshold tests.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrieverError> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, window) in text.as_bytes().windows(3).enumerate() {
            let mut hash = 0usize;
            for &b in window {
                hash = hash.wrapping_mul(31).wrapping_add(b as usize);
            }
            vector[hash % self.dimension] += 1.0 + (i % 3) as f32 * 0.1;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: The mock embedder is deterministic and returns unit
    /// vectors of the declared dimension.
    #[tokio::test]
    async fn mock_embedder_deterministic_unit_vectors() {
        let embedder = MockEmbedder::new(16);
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
