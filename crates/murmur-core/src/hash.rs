//! Deterministic content hashing for in-run deduplication.
//!
//! The harvester derives tweet IDs from text+URL; the pipeline fingerprints
//! tweet text alone so the same underlying content pulled from multiple
//! sources (vector store hits, keyword search, primary batch) collapses to
//! one key per run.

/// Hash an input string into a UUID-formatted fingerprint.
///
/// MD5 hex digest laid out 8-4-4-4-12. Not a real UUID version, but stable
/// and shaped to fit the same columns as externally supplied IDs.
pub fn content_hash(input: &str) -> String {
    let digest = md5::compute(input.as_bytes());
    let hex = format!("{:x}", digest);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
