//! Tweet repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use murmur_core::{Error, RelevancyTag, Result, ScoredDoc, Tweet, TweetRepository};

use crate::filter::{Filter, FilterClause, TextSearchMode};
use crate::store::{ExtraColumn, Metric, VectorRow, VectorStore, VectorStoreConfig};

/// PostgreSQL implementation of [`TweetRepository`].
pub struct PgTweetRepository {
    pool: PgPool,
    store: VectorStore,
}

impl PgTweetRepository {
    /// Create a repository over the `tweets` table.
    pub fn new(pool: PgPool, dims: usize) -> Result<Self> {
        let store = VectorStore::new(
            pool.clone(),
            VectorStoreConfig {
                table: "tweets",
                content_column: "text",
                extra_columns: vec![
                    ExtraColumn {
                        name: "date",
                        sql_type: "TIMESTAMPTZ",
                        returned: true,
                    },
                    ExtraColumn {
                        name: "url",
                        sql_type: "TEXT",
                        returned: true,
                    },
                    ExtraColumn {
                        name: "tags",
                        sql_type: "TEXT",
                        returned: true,
                    },
                ],
                metric: Metric::Cosine,
                dims,
            },
        )?;
        Ok(Self { pool, store })
    }

    /// Idempotent bootstrap of the tweets table and the relevancy tags
    /// table it reads from.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.store.ensure_schema().await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS relevancy_tags (
                id TEXT PRIMARY KEY,
                tag TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Deferred HNSW index build; see [`VectorStore::create_hnsw_index`].
    pub async fn create_hnsw_index(&self) -> Result<()> {
        self.store.create_hnsw_index(None, None).await
    }

    fn to_row(tweet: &Tweet) -> Result<VectorRow> {
        let embedding = tweet.embedding.clone().ok_or_else(|| {
            Error::InvalidInput(format!("tweet {} has no embedding", tweet.id))
        })?;
        let tags_json = tweet
            .tags
            .as_ref()
            .map(|t| serde_json::to_string(t))
            .transpose()?;
        Ok(VectorRow {
            id: tweet.id.clone(),
            content: tweet.text.clone(),
            vector: embedding,
            metadata: serde_json::json!({}),
            extras: vec![Some(tweet.date.to_rfc3339()), Some(tweet.url.clone()), tags_json],
        })
    }
}

#[async_trait]
impl TweetRepository for PgTweetRepository {
    async fn fetch(&self, id: &str) -> Result<Tweet> {
        let row = sqlx::query("SELECT id, text, date, url, tags FROM tweets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("tweet {id}")))?;

        let tags: Option<String> = row.get("tags");
        let tags = tags
            .as_deref()
            .filter(|t| !t.is_empty())
            .and_then(|t| serde_json::from_str::<Vec<String>>(t).ok());
        Ok(Tweet {
            id: row.get("id"),
            text: row.get("text"),
            date: row.get("date"),
            url: row.get("url"),
            tags,
            embedding: None,
            media: None,
            article_summary: None,
        })
    }

    async fn insert_bulk(&self, tweets: &[Tweet]) -> Result<()> {
        let rows = tweets.iter().map(Self::to_row).collect::<Result<Vec<_>>>()?;
        self.store.add_vectors(&rows).await
    }

    async fn upsert_embeddings(&self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        self.store.upsert_vectors(ids, vectors).await
    }

    async fn similar_tweets(
        &self,
        query_vector: &[f32],
        k: i64,
        tag_query: Option<&str>,
    ) -> Result<Vec<ScoredDoc>> {
        let filter = tag_query.map(|q| {
            FilterClause::column(Filter::text_search("text", q, TextSearchMode::Plain))
        });
        self.store
            .similarity_search(query_vector, k, filter.as_ref())
            .await
    }

    async fn relevancy_tags(&self) -> Result<Vec<RelevancyTag>> {
        let rows = sqlx::query("SELECT id, tag FROM relevancy_tags ORDER BY tag")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .into_iter()
            .map(|row| RelevancyTag {
                id: row.get("id"),
                tag: row.get("tag"),
            })
            .collect())
    }
}
