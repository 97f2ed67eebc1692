//! Relevance filtering and clustering strategies.
//!
//! Two interchangeable strategies sit behind [`ClassifierAggregator`]:
//! a zero-shot variant that asks the ML sidecar to label every tweet in
//! one batched call, and an LLM variant that runs the relevancy and
//! aggregation chains. The strategy is picked once at startup and never
//! swapped at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use murmur_core::{markup, GenerationBackend, RelevancyTag, Result, Tweet};
use murmur_inference::{AggregatorChain, RelevancyChain};
use murmur_services::ServiceCaller;

/// Which classifier strategy a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierStrategy {
    ZeroShot,
    #[default]
    Llm,
}

impl ClassifierStrategy {
    /// Parse from config. Unknown values fall back to the LLM strategy.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "zero_shot" | "zero-shot" | "zeroshot" => Self::ZeroShot,
            _ => Self::Llm,
        }
    }
}

/// Per-batch state computed up front by a strategy.
///
/// The zero-shot strategy stores its label matrix here so `filter_relevant`
/// and `cluster` reuse one classify call; the LLM strategy has no state.
#[derive(Debug, Clone, Default)]
pub struct PreprocessContext {
    labels: HashMap<String, Vec<String>>,
}

impl PreprocessContext {
    fn labels_for(&self, tweet_id: &str) -> &[String] {
        self.labels.get(tweet_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Strategy for deciding which tweets matter and how they group.
#[async_trait]
pub trait ClassifierAggregator: Send + Sync {
    /// Compute per-batch state. Runs once, before filtering.
    async fn preprocess(
        &self,
        tweets: &[Tweet],
        tags: &[RelevancyTag],
    ) -> Result<PreprocessContext>;

    /// Order-preserving relevant subset. Empty tag list keeps everything.
    async fn filter_relevant(
        &self,
        tweets: &[Tweet],
        tags: &[RelevancyTag],
        ctx: &PreprocessContext,
    ) -> Result<Vec<Tweet>>;

    /// Group the relevant tweets into story clusters.
    async fn cluster(
        &self,
        relevant: &[Tweet],
        ctx: &PreprocessContext,
    ) -> Result<Vec<Vec<Tweet>>>;
}

/// Zero-shot strategy: one batched classify call labels every tweet,
/// relevance means at least one label matched, clusters group by label.
/// A tweet carrying several labels appears in several clusters.
pub struct ZeroShotClassifierAggregator {
    caller: Arc<dyn ServiceCaller>,
}

impl ZeroShotClassifierAggregator {
    pub fn new(caller: Arc<dyn ServiceCaller>) -> Self {
        Self { caller }
    }
}

#[async_trait]
impl ClassifierAggregator for ZeroShotClassifierAggregator {
    async fn preprocess(
        &self,
        tweets: &[Tweet],
        tags: &[RelevancyTag],
    ) -> Result<PreprocessContext> {
        if tweets.is_empty() || tags.is_empty() {
            return Ok(PreprocessContext::default());
        }

        // Raw links degrade classifier scores, so they are stripped.
        let texts: Vec<String> = tweets.iter().map(|t| markup::strip_urls(&t.text)).collect();
        let classes: Vec<String> = tags.iter().map(|t| t.tag.clone()).collect();
        let matrix = self.caller.zero_shot_classification(&texts, &classes).await?;

        let labels = tweets
            .iter()
            .zip(matrix)
            .map(|(tweet, labels)| (tweet.id.clone(), labels))
            .collect();
        Ok(PreprocessContext { labels })
    }

    async fn filter_relevant(
        &self,
        tweets: &[Tweet],
        tags: &[RelevancyTag],
        ctx: &PreprocessContext,
    ) -> Result<Vec<Tweet>> {
        if tags.is_empty() {
            return Ok(tweets.to_vec());
        }
        // Matched labels ride along as the tweet's tags.
        let relevant: Vec<Tweet> = tweets
            .iter()
            .filter(|t| !ctx.labels_for(&t.id).is_empty())
            .map(|t| {
                let mut t = t.clone();
                t.tags = Some(ctx.labels_for(&t.id).to_vec());
                t
            })
            .collect();
        debug!(
            subsystem = "pipeline",
            component = "classifier",
            strategy = "zero_shot",
            total = tweets.len(),
            relevant = relevant.len(),
            "Relevance filter complete"
        );
        Ok(relevant)
    }

    async fn cluster(
        &self,
        relevant: &[Tweet],
        ctx: &PreprocessContext,
    ) -> Result<Vec<Vec<Tweet>>> {
        if relevant.is_empty() {
            return Ok(vec![]);
        }

        // Group by label, first-seen label order.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Tweet>> = HashMap::new();
        let mut unlabeled: Vec<Tweet> = Vec::new();
        for tweet in relevant {
            let labels = ctx.labels_for(&tweet.id);
            if labels.is_empty() {
                unlabeled.push(tweet.clone());
                continue;
            }
            for label in labels {
                if !groups.contains_key(label) {
                    order.push(label.clone());
                }
                groups.entry(label.clone()).or_default().push(tweet.clone());
            }
        }

        let mut clusters: Vec<Vec<Tweet>> = order
            .into_iter()
            .filter_map(|label| groups.remove(&label))
            .collect();
        // Without labels there is nothing to split on.
        if !unlabeled.is_empty() {
            clusters.push(unlabeled);
        }
        Ok(clusters)
    }
}

/// LLM strategy: the relevancy chain picks the newsworthy subset and the
/// aggregation chain groups by story, both over tweet markup.
pub struct LlmClassifierAggregator {
    relevancy: RelevancyChain,
    aggregator: AggregatorChain,
}

impl LlmClassifierAggregator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            relevancy: RelevancyChain::new(backend.clone()),
            aggregator: AggregatorChain::new(backend),
        }
    }
}

#[async_trait]
impl ClassifierAggregator for LlmClassifierAggregator {
    async fn preprocess(
        &self,
        _tweets: &[Tweet],
        _tags: &[RelevancyTag],
    ) -> Result<PreprocessContext> {
        Ok(PreprocessContext::default())
    }

    async fn filter_relevant(
        &self,
        tweets: &[Tweet],
        tags: &[RelevancyTag],
        _ctx: &PreprocessContext,
    ) -> Result<Vec<Tweet>> {
        if tags.is_empty() {
            return Ok(tweets.to_vec());
        }

        let topics: Vec<String> = tags.iter().map(|t| t.tag.clone()).collect();
        let ids = self
            .relevancy
            .run(&markup::serialize_tweets(tweets), &topics)
            .await?;
        let relevant: Vec<Tweet> = tweets
            .iter()
            .filter(|t| ids.iter().any(|id| id == &t.id))
            .cloned()
            .collect();
        debug!(
            subsystem = "pipeline",
            component = "classifier",
            strategy = "llm",
            total = tweets.len(),
            relevant = relevant.len(),
            "Relevance filter complete"
        );
        Ok(relevant)
    }

    async fn cluster(
        &self,
        relevant: &[Tweet],
        _ctx: &PreprocessContext,
    ) -> Result<Vec<Vec<Tweet>>> {
        if relevant.is_empty() {
            return Ok(vec![]);
        }

        let id_groups = self
            .aggregator
            .run(&markup::serialize_tweets(relevant))
            .await?;
        let by_id: HashMap<&str, &Tweet> =
            relevant.iter().map(|t| (t.id.as_str(), t)).collect();

        // IDs the model hallucinated are dropped with their clusters when
        // nothing real remains.
        let clusters: Vec<Vec<Tweet>> = id_groups
            .into_iter()
            .map(|group| {
                group
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()).map(|&t| t.clone()))
                    .collect::<Vec<Tweet>>()
            })
            .filter(|cluster: &Vec<Tweet>| !cluster.is_empty())
            .collect();
        debug!(
            subsystem = "pipeline",
            component = "classifier",
            strategy = "llm",
            clusters = clusters.len(),
            "Clustering complete"
        );
        Ok(clusters)
    }
}
