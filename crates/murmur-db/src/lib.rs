//! # murmur-db
//!
//! PostgreSQL storage layer for the murmur pipeline.
//!
//! This crate provides:
//! - Connection pool management with startup retry
//! - A vector store adapter over pgvector (similarity search, upserts,
//!   idempotent schema and HNSW index bootstrap)
//! - A filter DSL compiled to parameterized SQL
//! - Typed repositories for tweets, summaries, and relevancy tags

pub mod filter;
pub mod pool;
pub mod store;
pub mod summaries;
pub mod tweets;

pub use filter::{
    CompareOp, Filter, FilterClause, FilterValue, Join, JoinKind, OnCondition, QueryParam,
    TextSearchMode,
};
pub use pool::{connect_with_retry, create_pool, create_pool_with_config, PoolConfig};
pub use store::{ExtraColumn, Metric, VectorRow, VectorStore, VectorStoreConfig};
pub use summaries::PgSummaryRepository;
pub use tweets::PgTweetRepository;

pub use murmur_core::*;
