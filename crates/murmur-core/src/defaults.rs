//! Default values and tuning constants shared across crates.

/// Embedding dimensionality for the default embedding model.
pub const EMBED_DIMENSION: usize = 1536;

/// Candidates fetched from the summary store during a duplicate check.
pub const DUPLICATE_CHECK_CANDIDATES: i64 = 3;

/// Nearest neighbors fetched per cluster tweet during context enrichment.
pub const CONTEXT_NEIGHBORS: i64 = 10;

/// Context tweets kept per cluster tweet after reranking.
pub const CONTEXT_KEEP: usize = 5;

/// How far back (days) the harvester keyword search reaches.
pub const KEYWORD_SEARCH_WINDOW_DAYS: i64 = 14;

/// Minimum favourite count required of keyword-search results.
pub const KEYWORD_SEARCH_MIN_FAVES: u32 = 10;

/// Database connection attempts before giving up at startup.
pub const DB_CONNECT_RETRIES: u32 = 5;

/// Delay between database connection attempts, in milliseconds.
pub const DB_CONNECT_RETRY_DELAY_MS: u64 = 5000;

/// Default HNSW graph degree (max connections per layer).
pub const HNSW_M: u32 = 16;

/// Default HNSW construction candidate list size.
pub const HNSW_EF_CONSTRUCTION: u32 = 64;

/// Default request timeout for LLM calls, in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Default request timeout for sibling-service calls, in seconds.
pub const SERVICE_TIMEOUT_SECS: u64 = 120;
