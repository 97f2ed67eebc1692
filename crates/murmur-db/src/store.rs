//! Vector store adapter over pgvector.
//!
//! One [`VectorStore`] wraps one table holding an id, a content column, a
//! `vector(dims)` embedding, a jsonb metadata column, and a configurable
//! set of extra columns. Similarity search, bulk upsert, embedding-only
//! updates, and idempotent schema/index bootstrap all go through here.

use pgvector::Vector;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use murmur_core::defaults::{HNSW_EF_CONSTRUCTION, HNSW_M};
use murmur_core::{Error, Result, ScoredDoc};

use crate::filter::{FilterClause, QueryParam};

/// Distance metric for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    L2,
    InnerProduct,
    Manhattan,
}

impl Metric {
    /// pg operator for this metric, or a config error for metrics the
    /// installed extension does not support.
    fn operator(self) -> Result<&'static str> {
        match self {
            Metric::Cosine => Ok("<=>"),
            Metric::L2 => Ok("<->"),
            Metric::InnerProduct => Ok("<#>"),
            Metric::Manhattan => Err(Error::Config(
                "metric manhattan is not supported by pgvector; allowed: cosine, l2, inner_product"
                    .to_string(),
            )),
        }
    }

    /// Operator class for HNSW index creation.
    fn ops_class(self) -> Result<&'static str> {
        match self {
            Metric::Cosine => Ok("vector_cosine_ops"),
            Metric::L2 => Ok("vector_l2_ops"),
            Metric::InnerProduct => Ok("vector_ip_ops"),
            Metric::Manhattan => Err(Error::Config(
                "metric manhattan is not supported by pgvector".to_string(),
            )),
        }
    }
}

/// An extra (non-core) column of the backing table.
#[derive(Debug, Clone)]
pub struct ExtraColumn {
    pub name: &'static str,
    /// SQL type used during table creation, e.g. `TIMESTAMPTZ`.
    pub sql_type: &'static str,
    /// Whether similarity searches return this column.
    pub returned: bool,
}

/// Configuration for one vector-backed table.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub table: &'static str,
    pub content_column: &'static str,
    pub extra_columns: Vec<ExtraColumn>,
    pub metric: Metric,
    pub dims: usize,
}

/// One row to upsert through [`VectorStore::add_vectors`].
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
    /// Values for the configured extra columns, in declaration order.
    /// `None` leaves the column NULL.
    pub extras: Vec<Option<String>>,
}

/// Vector similarity store over a single Postgres table.
pub struct VectorStore {
    pool: PgPool,
    config: VectorStoreConfig,
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Text(v) => query.bind(v.as_str()),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
    }
}

impl VectorStore {
    /// Create a store handle. Fails fast on a metric the extension does
    /// not support.
    pub fn new(pool: PgPool, config: VectorStoreConfig) -> Result<Self> {
        config.metric.operator()?;
        Ok(Self { pool, config })
    }

    pub fn table(&self) -> &str {
        self.config.table
    }

    /// Idempotent extension + table bootstrap.
    ///
    /// Index creation is deliberately separate: HNSW build parameters are
    /// tuned once substantial data volume exists.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        let extras = self
            .config
            .extra_columns
            .iter()
            .map(|c| format!(", {} {}", c.name, c.sql_type))
            .collect::<String>();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                {content} TEXT,
                embedding vector({dims}),
                metadata JSONB DEFAULT '{{}}'::jsonb{extras}
            )",
            table = self.config.table,
            content = self.config.content_column,
            dims = self.config.dims,
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "vector_store",
            op = "ensure_schema",
            table = self.config.table,
            "Ensured vector table exists"
        );
        Ok(())
    }

    /// Idempotent HNSW index creation with explicit build parameters.
    pub async fn create_hnsw_index(&self, m: Option<u32>, ef_construction: Option<u32>) -> Result<()> {
        let ddl = format!(
            "CREATE INDEX IF NOT EXISTS {table}_embedding_hnsw_idx
             ON {table} USING hnsw (embedding {ops})
             WITH (m = {m}, ef_construction = {efc})",
            table = self.config.table,
            ops = self.config.metric.ops_class()?,
            m = m.unwrap_or(HNSW_M),
            efc = ef_construction.unwrap_or(HNSW_EF_CONSTRUCTION),
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "db",
            component = "vector_store",
            op = "create_hnsw_index",
            table = self.config.table,
            "Ensured HNSW index exists"
        );
        Ok(())
    }

    /// k-NN search by query vector with an optional filter.
    ///
    /// Zero matching rows yields an empty vec; every other failure
    /// propagates unmodified.
    pub async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: i64,
        filter: Option<&FilterClause>,
    ) -> Result<Vec<ScoredDoc>> {
        let table = self.config.table;
        let built = match filter {
            // $1 = query vector, $2 = limit
            Some(clause) => Some(clause.build(table, "metadata", 2)?),
            None => None,
        };

        let returned_extras = self
            .config
            .extra_columns
            .iter()
            .filter(|c| c.returned)
            .map(|c| format!(", {table}.{}", c.name))
            .collect::<String>();

        let join_sql = built.as_ref().map(|b| b.join_sql.as_str()).unwrap_or("");
        let where_sql = built
            .as_ref()
            .map(|b| b.where_sql.as_str())
            .filter(|w| !w.is_empty())
            .map(|w| format!("WHERE {w}"))
            .unwrap_or_default();

        let sql = format!(
            "SELECT {table}.id AS id,
                    {table}.{content} AS content,
                    {table}.metadata AS metadata,
                    ({table}.embedding {op} $1)::float8 AS _distance{extras}
             FROM {table} {join_sql}
             {where_sql}
             ORDER BY _distance
             LIMIT $2",
            content = self.config.content_column,
            op = self.config.metric.operator()?,
            extras = returned_extras,
        );

        let mut query = sqlx::query(&sql)
            .bind(Vector::from(query_vector.to_vec()))
            .bind(k);
        if let Some(b) = &built {
            for param in &b.params {
                query = bind_param(query, param);
            }
        }

        let rows = query.fetch_all(&self.pool).await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "vector_store",
            op = "similarity_search",
            table = self.config.table,
            result_count = rows.len(),
            "Similarity search completed"
        );

        let has = |name: &str| {
            self.config
                .extra_columns
                .iter()
                .any(|c| c.returned && c.name == name)
        };
        let docs = rows
            .into_iter()
            .map(|row| ScoredDoc {
                id: row.get("id"),
                content: row.get("content"),
                metadata: row.get("metadata"),
                distance: row.get("_distance"),
                date: if has("date") { row.get("date") } else { None },
                url: if has("url") { row.get("url") } else { None },
                tags: if has("tags") { row.get("tags") } else { None },
            })
            .collect();
        Ok(docs)
    }

    /// Bulk upsert. Conflicting IDs overwrite every column.
    pub async fn add_vectors(&self, rows: &[VectorRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let table = self.config.table;
        let content = self.config.content_column;
        let extras = &self.config.extra_columns;

        let extra_names = extras
            .iter()
            .map(|c| format!(", {}", c.name))
            .collect::<String>();
        let extra_updates = extras
            .iter()
            .map(|c| format!(", {0} = EXCLUDED.{0}", c.name))
            .collect::<String>();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for row in rows {
            if row.extras.len() != extras.len() {
                return Err(Error::InvalidInput(format!(
                    "expected {} extra column values, got {}",
                    extras.len(),
                    row.extras.len()
                )));
            }
            // Extra values bind as text and cast to the column's type so
            // e.g. timestamptz columns accept ISO 8601 strings.
            let placeholders = extras
                .iter()
                .enumerate()
                .map(|(i, c)| format!(", ${}::{}", i + 5, c.sql_type))
                .collect::<String>();
            let sql = format!(
                "INSERT INTO {table} (id, {content}, embedding, metadata{extra_names})
                 VALUES ($1, $2, $3, $4{placeholders})
                 ON CONFLICT (id) DO UPDATE SET
                     {content} = EXCLUDED.{content},
                     embedding = EXCLUDED.embedding,
                     metadata = EXCLUDED.metadata{extra_updates}"
            );
            let mut query = sqlx::query(&sql)
                .bind(&row.id)
                .bind(&row.content)
                .bind(Vector::from(row.vector.clone()))
                .bind(&row.metadata);
            for extra in &row.extras {
                query = query.bind(extra.as_deref());
            }
            query.execute(&mut *tx).await.map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "vector_store",
            op = "add_vectors",
            table = self.config.table,
            row_count = rows.len(),
            "Upserted vectors"
        );
        Ok(())
    }

    /// Embedding-only update for existing rows.
    pub async fn upsert_vectors(&self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "id/vector count mismatch: {} vs {}",
                ids.len(),
                vectors.len()
            )));
        }
        let sql = format!(
            "UPDATE {table} SET embedding = $2 WHERE id = $1",
            table = self.config.table
        );
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for (id, vector) in ids.iter().zip(vectors) {
            sqlx::query(&sql)
                .bind(id)
                .bind(Vector::from(vector.clone()))
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
