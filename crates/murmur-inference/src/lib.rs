//! # murmur-inference
//!
//! LLM inference for the murmur pipeline.
//!
//! This crate provides:
//! - An OpenAI-compatible chat + embedding backend
//! - Structured-output chains for relevancy filtering, aggregation, tag
//!   generation, duplicate checking, and summarization
//! - Output sanitization tolerant of slightly malformed model JSON
//! - Mock backends for deterministic testing

pub mod chains;
pub mod openai;
pub mod parse;

pub mod mock;

pub use chains::{
    AggregatorChain, ArticleSummarizerChain, DuplicateCheckChain, RelevancyChain, TagChain,
    TweetSummarizerChain,
};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use parse::{extract_json_object, parse_keyed, sanitize_json};

pub use murmur_core::*;
