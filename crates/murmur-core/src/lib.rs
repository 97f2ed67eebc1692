//! # murmur-core
//!
//! Shared types and traits for the murmur tweet aggregation pipeline.
//!
//! This crate provides:
//! - The `Tweet`, `Summary`, and `RelevancyTag` data model
//! - The core `Error` type used across every subsystem
//! - Content hashing for in-run deduplication
//! - Tweet markup serialization for LLM prompts
//! - Backend traits for embedding and text generation

pub mod defaults;
pub mod error;
pub mod hash;
pub mod markup;
pub mod models;
pub mod traits;

pub use error::{Error, Result};
pub use hash::content_hash;
pub use markup::{extract_urls, serialize_tweets, status_id, strip_urls};
pub use models::{RelevancyTag, ScoredDoc, Summary, Tweet, TweetMedia};
pub use traits::{EmbeddingBackend, GenerationBackend, SummaryRepository, TweetRepository};
