//! Prompt chains over a generation backend.
//!
//! Each chain pairs a prompt template with a typed parser for the
//! model's structured output. Chains take tweets as serialized markup
//! (see `murmur_core::markup`) so prompts stay stable regardless of
//! how tweets are stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use murmur_core::{GenerationBackend, Result};

use crate::parse::parse_keyed;

const RELEVANCY_SYSTEM: &str = "You are a news analyst triaging a stream of tweets. \
You decide which tweets carry newsworthy, substantive information and which are \
noise (jokes, personal chatter, pure reactions, spam).";

const RELEVANCY_PROMPT: &str = "Below is a batch of tweets in markup form. Identify the \
tweets that are relevant to the listed topics and carry substantive information.\n\n\
Topics: {tags}\n\nTweets:\n{tweets}\n\n\
Respond with a JSON object of the form {\"relevant_tweets\": [\"<id>\", ...]} listing \
the ids of relevant tweets. Include no other text.";

const AGGREGATOR_SYSTEM: &str = "You are a news analyst grouping tweets into stories. \
Tweets that report on the same underlying event or topic belong in the same group.";

const AGGREGATOR_PROMPT: &str = "Group the tweets below into clusters, where each cluster \
covers a single story or event. Every tweet id must appear in exactly one cluster.\n\n\
Tweets:\n{tweets}\n\n\
Respond with a JSON object of the form \
{\"aggregated_tweets\": [[\"<id>\", ...], [\"<id>\", ...]]}. Include no other text.";

const TAG_SYSTEM: &str = "You are a news analyst extracting topical tags from clusters \
of related tweets.";

const TAG_PROMPT: &str = "For each cluster of tweets below, extract a short list of \
topical keywords describing the story it covers.\n\n\
Clusters:\n{clusters}\n\n\
Respond with a JSON object of the form \
{\"extracted_tags\": [[\"<tag>\", ...], [\"<tag>\", ...]]}, one tag list per cluster, \
in the same order. Include no other text.";

const DUPLICATE_SYSTEM: &str = "You are a news analyst deciding whether a cluster of \
tweets reports the same story as an existing summary.";

const DUPLICATE_PROMPT: &str = "Existing summary (written {date}):\n{summary}\n\n\
New tweets:\n{tweets}\n\n\
Do the new tweets report the same story the summary already covers, with no \
substantial new information? Respond with a JSON object of the form \
{\"duplicated\": \"true\"} or {\"duplicated\": \"false\"}. Include no other text.";

const SUMMARIZER_SYSTEM: &str = "You are a news writer producing concise, factual \
summaries from social media sources. Write in markdown. Cite concrete facts, \
attribute claims to their sources, and never invent details.";

const SUMMARIZER_PROMPT: &str = "Write a summary of the story covered by the primary \
tweets below. The context tweets provide background; use them only to clarify or \
corroborate, and prefer the primary tweets when they disagree.\n\n\
Primary tweets:\n{tweets}\n\nContext tweets:\n{context}\n\n\
Respond with the markdown summary only.";

const ARTICLE_SYSTEM: &str = "You summarize news articles into a few dense sentences \
that preserve the key facts.";

const ARTICLE_PROMPT: &str = "Summarize the following article in at most four \
sentences, keeping names, numbers, and dates intact.\n\nArticle:\n{article}\n\n\
Respond with the summary only.";

/// Filters a batch of tweets down to the relevant ones.
pub struct RelevancyChain {
    backend: Arc<dyn GenerationBackend>,
}

impl RelevancyChain {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Returns the ids of relevant tweets from the batch.
    pub async fn run(&self, tweets_markup: &str, tags: &[String]) -> Result<Vec<String>> {
        let prompt = RELEVANCY_PROMPT
            .replace("{tags}", &tags.join(", "))
            .replace("{tweets}", tweets_markup);
        let raw = self
            .backend
            .generate_with_system(RELEVANCY_SYSTEM, &prompt)
            .await?;
        let ids: Vec<String> = parse_keyed(&raw, "relevant_tweets")?;
        debug!(
            subsystem = "inference",
            component = "relevancy_chain",
            relevant = ids.len(),
            "Relevancy filter complete"
        );
        Ok(ids)
    }
}

/// Groups tweets into story clusters.
pub struct AggregatorChain {
    backend: Arc<dyn GenerationBackend>,
}

impl AggregatorChain {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Returns clusters as lists of tweet ids.
    pub async fn run(&self, tweets_markup: &str) -> Result<Vec<Vec<String>>> {
        let prompt = AGGREGATOR_PROMPT.replace("{tweets}", tweets_markup);
        let raw = self
            .backend
            .generate_with_system(AGGREGATOR_SYSTEM, &prompt)
            .await?;
        let clusters: Vec<Vec<String>> = parse_keyed(&raw, "aggregated_tweets")?;
        debug!(
            subsystem = "inference",
            component = "aggregator_chain",
            clusters = clusters.len(),
            "Aggregation complete"
        );
        Ok(clusters)
    }
}

/// Extracts topical tags for each cluster.
pub struct TagChain {
    backend: Arc<dyn GenerationBackend>,
}

impl TagChain {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Returns one tag list per cluster, in cluster order.
    ///
    /// `clusters_markup` holds the serialized tweets of each cluster.
    pub async fn run(&self, clusters_markup: &[String]) -> Result<Vec<Vec<String>>> {
        let rendered = clusters_markup
            .iter()
            .enumerate()
            .map(|(i, c)| format!("Cluster {}:\n{c}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = TAG_PROMPT.replace("{clusters}", &rendered);
        let raw = self.backend.generate_with_system(TAG_SYSTEM, &prompt).await?;
        parse_keyed(&raw, "extracted_tags")
    }
}

/// Decides whether a cluster duplicates an existing summary.
pub struct DuplicateCheckChain {
    backend: Arc<dyn GenerationBackend>,
}

impl DuplicateCheckChain {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub async fn run(
        &self,
        tweets_markup: &str,
        summary_text: &str,
        summary_date: DateTime<Utc>,
    ) -> Result<bool> {
        let prompt = DUPLICATE_PROMPT
            .replace("{date}", &summary_date.to_rfc3339())
            .replace("{summary}", summary_text)
            .replace("{tweets}", tweets_markup);
        let raw = self
            .backend
            .generate_with_system(DUPLICATE_SYSTEM, &prompt)
            .await?;
        let verdict: String = parse_keyed(&raw, "duplicated")?;
        Ok(verdict.eq_ignore_ascii_case("true"))
    }
}

/// Produces a markdown summary for a cluster of tweets.
pub struct TweetSummarizerChain {
    backend: Arc<dyn GenerationBackend>,
}

impl TweetSummarizerChain {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub async fn run(&self, tweets_markup: &str, context_markup: &str) -> Result<String> {
        let context = if context_markup.is_empty() {
            "(none)"
        } else {
            context_markup
        };
        let prompt = SUMMARIZER_PROMPT
            .replace("{tweets}", tweets_markup)
            .replace("{context}", context);
        let summary = self
            .backend
            .generate_with_system(SUMMARIZER_SYSTEM, &prompt)
            .await?;
        Ok(summary.trim().to_string())
    }
}

/// Condenses a linked article into a few sentences.
pub struct ArticleSummarizerChain {
    backend: Arc<dyn GenerationBackend>,
}

impl ArticleSummarizerChain {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub async fn run(&self, article_text: &str) -> Result<String> {
        let prompt = ARTICLE_PROMPT.replace("{article}", article_text);
        let summary = self
            .backend
            .generate_with_system(ARTICLE_SYSTEM, &prompt)
            .await?;
        Ok(summary.trim().to_string())
    }
}
