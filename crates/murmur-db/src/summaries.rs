//! Summary repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use murmur_core::{Error, Result, ScoredDoc, Summary, SummaryRepository};

use crate::filter::{Filter, FilterClause, TextSearchMode};
use crate::store::{ExtraColumn, Metric, VectorRow, VectorStore, VectorStoreConfig};

/// PostgreSQL implementation of [`SummaryRepository`].
pub struct PgSummaryRepository {
    store: VectorStore,
}

impl PgSummaryRepository {
    /// Create a repository over the `summaries` table.
    pub fn new(pool: PgPool, dims: usize) -> Result<Self> {
        let store = VectorStore::new(
            pool,
            VectorStoreConfig {
                table: "summaries",
                content_column: "text",
                extra_columns: vec![ExtraColumn {
                    name: "date",
                    sql_type: "TIMESTAMPTZ",
                    returned: true,
                }],
                metric: Metric::Cosine,
                dims,
            },
        )?;
        Ok(Self { store })
    }

    /// Idempotent bootstrap of the summaries table.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.store.ensure_schema().await
    }

    /// Deferred HNSW index build; see [`VectorStore::create_hnsw_index`].
    pub async fn create_hnsw_index(&self) -> Result<()> {
        self.store.create_hnsw_index(None, None).await
    }
}

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    async fn insert_bulk(&self, summaries: &[Summary], embeddings: &[Vec<f32>]) -> Result<()> {
        if summaries.len() != embeddings.len() {
            return Err(Error::InvalidInput(format!(
                "summary/embedding count mismatch: {} vs {}",
                summaries.len(),
                embeddings.len()
            )));
        }
        let now = Utc::now().to_rfc3339();
        let rows = summaries
            .iter()
            .zip(embeddings)
            .map(|(summary, embedding)| VectorRow {
                id: summary.id.clone(),
                content: summary.text.clone(),
                vector: embedding.clone(),
                metadata: serde_json::json!({ "ref_tweets": summary.ref_tweets }),
                extras: vec![Some(now.clone())],
            })
            .collect::<Vec<_>>();
        self.store.add_vectors(&rows).await
    }

    async fn similar_summaries(
        &self,
        query_vector: &[f32],
        k: i64,
        tags: Option<&[String]>,
    ) -> Result<Vec<ScoredDoc>> {
        // Topical restriction mirrors the tweet side: a plain-mode
        // full-text query over the summary text using the cluster tags.
        let filter = tags.filter(|t| !t.is_empty()).map(|t| {
            FilterClause::column(Filter::text_search(
                "text",
                t.join(" | "),
                TextSearchMode::Plain,
            ))
        });
        self.store
            .similarity_search(query_vector, k, filter.as_ref())
            .await
    }
}
