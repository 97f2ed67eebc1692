//! # murmur-pipeline
//!
//! The tweet processing pipeline: relevance filtering, story
//! clustering, duplicate detection against stored summaries, context
//! enrichment, and summarization with provenance tracking.
//!
//! Every external dependency (stores, LLM backends, sidecar services)
//! is injected as a trait object, so the full pipeline runs under test
//! with in-memory doubles.

pub mod classifier;
pub mod dedup;
pub mod enrich;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testutil;

pub use classifier::{
    ClassifierAggregator, ClassifierStrategy, LlmClassifierAggregator, PreprocessContext,
    ZeroShotClassifierAggregator,
};
pub use dedup::DuplicateChecker;
pub use enrich::{ContextEnricher, SeenHashes};
pub use pipeline::{Pipeline, PipelineDeps};

pub use murmur_core::*;
