//! Backend traits for embedding and text generation.
//!
//! Concrete implementations live in `murmur-inference`; the pipeline only
//! depends on these interfaces, which keeps every LLM-facing stage
//! swappable for a test double.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RelevancyTag, ScoredDoc, Summary, Tweet};

/// Backend for embedding generation.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::Error::Embedding("backend returned no vectors".to_string()))
    }

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Repository for persisted tweets with vector similarity lookup.
#[async_trait]
pub trait TweetRepository: Send + Sync {
    /// Fetch a tweet by ID. `Error::NotFound` when absent.
    async fn fetch(&self, id: &str) -> Result<Tweet>;

    /// Upsert tweets (conflicting IDs overwrite all columns).
    ///
    /// Every tweet must carry an embedding; `Error::InvalidInput` otherwise.
    async fn insert_bulk(&self, tweets: &[Tweet]) -> Result<()>;

    /// Update only the embedding column for the given IDs.
    async fn upsert_embeddings(&self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()>;

    /// k-NN search over stored tweets, optionally restricted by a
    /// full-text query over tweet text (`tag1 | tag2` plain syntax).
    async fn similar_tweets(
        &self,
        query_vector: &[f32],
        k: i64,
        tag_query: Option<&str>,
    ) -> Result<Vec<ScoredDoc>>;

    /// Read the operator-curated relevancy tags.
    async fn relevancy_tags(&self) -> Result<Vec<RelevancyTag>>;
}

/// Repository for persisted summaries with vector similarity lookup.
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Bulk-insert summaries. Embeddings are supplied by the caller, one
    /// per summary, generated from the summary text.
    async fn insert_bulk(&self, summaries: &[Summary], embeddings: &[Vec<f32>]) -> Result<()>;

    /// k-NN search over stored summaries, optionally restricted to
    /// summaries whose recorded topic tags match any of `tags`.
    async fn similar_summaries(
        &self,
        query_vector: &[f32],
        k: i64,
        tags: Option<&[String]>,
    ) -> Result<Vec<ScoredDoc>>;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}
