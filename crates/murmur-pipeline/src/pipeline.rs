//! The tweet processing orchestrator.
//!
//! `process_tweets` drives a batch end to end: assign ids, filter for
//! relevance, cluster, then per cluster (concurrently) gate on the
//! duplicate check, generate tags and embeddings, enrich, summarize,
//! and finally persist all surviving summaries in one bulk insert.
//!
//! Clusters are isolated: one cluster failing is logged and dropped,
//! its siblings and the final persistence proceed.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use murmur_core::{
    markup, EmbeddingBackend, GenerationBackend, RelevancyTag, Result, Summary, SummaryRepository,
    Tweet, TweetRepository,
};
use murmur_inference::{TagChain, TweetSummarizerChain};
use murmur_services::ServiceCaller;

use crate::classifier::ClassifierAggregator;
use crate::dedup::DuplicateChecker;
use crate::enrich::{ContextEnricher, SeenHashes};

/// Everything the pipeline needs, injected so each piece can be a test
/// double.
pub struct PipelineDeps {
    pub tweets: Arc<dyn TweetRepository>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub generation: Arc<dyn GenerationBackend>,
    pub caller: Arc<dyn ServiceCaller>,
    pub strategy: Arc<dyn ClassifierAggregator>,
}

pub struct Pipeline {
    tweets: Arc<dyn TweetRepository>,
    summaries: Arc<dyn SummaryRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    strategy: Arc<dyn ClassifierAggregator>,
    dedup: DuplicateChecker,
    enricher: ContextEnricher,
    tag_chain: TagChain,
    summarizer: TweetSummarizerChain,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let dedup = DuplicateChecker::new(
            deps.summaries.clone(),
            deps.embedder.clone(),
            deps.generation.clone(),
        );
        let enricher = ContextEnricher::new(
            deps.tweets.clone(),
            deps.embedder.clone(),
            deps.caller,
            deps.generation.clone(),
        );
        Self {
            tweets: deps.tweets,
            summaries: deps.summaries,
            embedder: deps.embedder,
            strategy: deps.strategy,
            dedup,
            enricher,
            tag_chain: TagChain::new(deps.generation.clone()),
            summarizer: TweetSummarizerChain::new(deps.generation),
        }
    }

    /// Process one batch of raw tweets into persisted summaries.
    ///
    /// Empty batches, all-irrelevant batches, and batches clustering to
    /// nothing are quiet no-ops.
    pub async fn process_tweets(&self, mut tweets: Vec<Tweet>) -> Result<()> {
        if tweets.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        for tweet in &mut tweets {
            if tweet.id.is_empty() {
                tweet.id = Uuid::new_v4().to_string();
            }
        }

        let topics = self.tweets.relevancy_tags().await?;
        let ctx = self.strategy.preprocess(&tweets, &topics).await?;
        let relevant = self.strategy.filter_relevant(&tweets, &topics, &ctx).await?;
        if relevant.is_empty() {
            info!(
                subsystem = "pipeline",
                component = "orchestrator",
                received = tweets.len(),
                "No relevant tweets in batch"
            );
            return Ok(());
        }

        let clusters = self.strategy.cluster(&relevant, &ctx).await?;
        if clusters.is_empty() {
            return Ok(());
        }
        let cluster_count = clusters.len();

        let seen = SeenHashes::new();
        let outcomes = join_all(
            clusters
                .into_iter()
                .map(|cluster| self.process_cluster(cluster, &seen)),
        )
        .await;

        let mut summaries: Vec<Summary> = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) => {
                    error!(
                        subsystem = "pipeline",
                        component = "orchestrator",
                        error = %e,
                        "Cluster failed, dropping it"
                    );
                }
            }
        }

        if !summaries.is_empty() {
            let texts: Vec<String> = summaries.iter().map(|s| s.text.clone()).collect();
            let embeddings = self.embedder.embed_texts(&texts).await?;
            self.summaries.insert_bulk(&summaries, &embeddings).await?;
        }

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            received = tweets.len(),
            relevant = relevant.len(),
            clusters = cluster_count,
            summaries = summaries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch processed"
        );
        Ok(())
    }

    /// One cluster's pipeline: dedup gate, tags + embeddings, article
    /// and context enrichment, summarization. `None` for duplicates.
    async fn process_cluster(
        &self,
        mut cluster: Vec<Tweet>,
        seen: &SeenHashes,
    ) -> Result<Option<Summary>> {
        if cluster.is_empty() {
            return Ok(None);
        }

        let known_tags = cluster_tags(&cluster);
        let dup_filter = (!known_tags.is_empty()).then_some(known_tags.as_slice());
        if self.dedup.is_duplicate(&cluster, dup_filter).await? {
            info!(
                subsystem = "pipeline",
                component = "orchestrator",
                cluster_size = cluster.len(),
                "Cluster duplicates an existing summary"
            );
            return Ok(None);
        }

        let per_tweet_markup: Vec<String> = cluster
            .iter()
            .map(|t| markup::serialize_tweets(std::slice::from_ref(t)))
            .collect();
        let texts: Vec<String> = cluster.iter().map(|t| t.text.clone()).collect();
        let (tags, embeddings) = futures::join!(
            self.tag_chain.run(&per_tweet_markup),
            self.embedder.embed_texts(&texts)
        );
        let (tags, embeddings) = (tags?, embeddings?);
        if tags.len() != cluster.len() {
            warn!(
                subsystem = "pipeline",
                component = "orchestrator",
                expected = cluster.len(),
                got = tags.len(),
                "Tag generation returned a short list"
            );
        }
        for (tweet, tag_list) in cluster.iter_mut().zip(tags) {
            tweet.tags = Some(tag_list);
        }
        for (tweet, embedding) in cluster.iter_mut().zip(embeddings) {
            tweet.embedding = Some(embedding);
        }

        self.enricher.enrich_articles(&mut cluster).await?;

        let (context, persisted) = futures::join!(
            self.enricher.gather_context(&cluster, seen),
            self.tweets.insert_bulk(&cluster)
        );
        persisted?;
        let context = context?;

        // Context goes through the relevance filter again, with the
        // cluster's generated tags standing in as topics.
        let context = if context.is_empty() {
            context
        } else {
            let topics: Vec<RelevancyTag> = cluster_tags(&cluster)
                .into_iter()
                .enumerate()
                .map(|(i, tag)| RelevancyTag {
                    id: i.to_string(),
                    tag,
                })
                .collect();
            let ctx = self.strategy.preprocess(&context, &topics).await?;
            self.strategy.filter_relevant(&context, &topics, &ctx).await?
        };

        let summary_text = self
            .summarizer
            .run(
                &markup::serialize_tweets(&cluster),
                &markup::serialize_tweets(&context),
            )
            .await?;

        let mut ref_tweets: Vec<String> = cluster
            .iter()
            .chain(&context)
            .filter(|t| {
                markup::status_id(&t.url)
                    .map(|sid| summary_text.contains(&sid))
                    .unwrap_or(false)
            })
            .map(|t| t.id.clone())
            .collect();
        // The model cited nothing recognizable; the cluster itself is
        // still the summary's provenance.
        if ref_tweets.is_empty() {
            ref_tweets = cluster.iter().map(|t| t.id.clone()).collect();
        }

        Ok(Some(Summary {
            id: Uuid::new_v4().to_string(),
            text: summary_text,
            ref_tweets,
        }))
    }
}

/// Distinct tags across a cluster, first-seen order.
fn cluster_tags(cluster: &[Tweet]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tweet in cluster {
        if let Some(tags) = &tweet.tags {
            for tag in tags {
                if !out.contains(tag) {
                    out.push(tag.clone());
                }
            }
        }
    }
    out
}
