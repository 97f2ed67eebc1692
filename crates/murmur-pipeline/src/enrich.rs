//! Context enrichment for clustered tweets.
//!
//! A cluster alone is often too thin to summarize well. The enricher
//! pulls in background from two directions: nearest neighbors out of
//! the tweet store, and a fresh harvester keyword search over the
//! cluster's tags. Linked articles are fetched and condensed into
//! `article_summary` annotations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use futures::future::try_join_all;
use tracing::{debug, warn};

use murmur_core::defaults::{
    CONTEXT_KEEP, CONTEXT_NEIGHBORS, KEYWORD_SEARCH_MIN_FAVES, KEYWORD_SEARCH_WINDOW_DAYS,
};
use murmur_core::{
    content_hash, markup, EmbeddingBackend, GenerationBackend, Result, Tweet, TweetRepository,
};
use murmur_inference::ArticleSummarizerChain;
use murmur_services::ServiceCaller;

/// Content hashes already claimed by some cluster in this batch.
///
/// Clusters resolve concurrently, so claims go through a mutex. A
/// context tweet claimed once never appears in a sibling cluster's
/// context.
#[derive(Default)]
pub struct SeenHashes(Mutex<HashSet<String>>);

impl SeenHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a hash. False when some cluster already holds it.
    pub fn claim(&self, hash: String) -> bool {
        self.0.lock().unwrap().insert(hash)
    }
}

pub struct ContextEnricher {
    tweets: Arc<dyn TweetRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    caller: Arc<dyn ServiceCaller>,
    article_chain: ArticleSummarizerChain,
}

impl ContextEnricher {
    pub fn new(
        tweets: Arc<dyn TweetRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
        caller: Arc<dyn ServiceCaller>,
        generation: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            tweets,
            embedder,
            caller,
            article_chain: ArticleSummarizerChain::new(generation),
        }
    }

    /// Nearest stored neighbors of one tweet, reranked against its text.
    ///
    /// Searches with the tweet's own embedding when present, restricted
    /// by a full-text tag filter when the tweet carries tags.
    async fn neighbors_for(&self, tweet: &Tweet) -> Result<Vec<Tweet>> {
        let vector = match &tweet.embedding {
            Some(v) => v.clone(),
            None => self.embedder.embed_query(&tweet.text).await?,
        };
        let tag_query = tweet
            .tags
            .as_ref()
            .filter(|tags| !tags.is_empty())
            .map(|tags| tags.join(" | "));

        let docs = self
            .tweets
            .similar_tweets(&vector, CONTEXT_NEIGHBORS, tag_query.as_deref())
            .await?;
        if docs.is_empty() {
            return Ok(vec![]);
        }

        let contents: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let order = self
            .caller
            .cross_encoder_rerank(&tweet.text, &contents)
            .await?;

        let mut docs: Vec<Option<_>> = docs.into_iter().map(Some).collect();
        let docs_len = docs.len();
        Ok(order
            .into_iter()
            .filter(|&idx| idx < docs_len)
            .filter_map(|idx| docs[idx].take())
            .take(CONTEXT_KEEP)
            .map(|doc| doc.into_tweet())
            .collect())
    }

    /// Harvester keyword search for one tag group over the recent window.
    async fn keyword_search(&self, tags: &[String]) -> Result<Vec<Tweet>> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let query = format!(
            "(\"{}\") min_faves:{}",
            tags.join("\" AND \""),
            KEYWORD_SEARCH_MIN_FAVES
        );
        let to_date = Utc::now();
        let from_date = to_date - Duration::days(KEYWORD_SEARCH_WINDOW_DAYS);
        self.caller
            .search_relevant_tweets(&query, from_date, to_date)
            .await
    }

    /// All context for a cluster: per-tweet vector neighbors plus one
    /// keyword search per distinct tag group, deduplicated against the
    /// cluster itself and against sibling clusters via `seen`.
    pub async fn gather_context(&self, cluster: &[Tweet], seen: &SeenHashes) -> Result<Vec<Tweet>> {
        for tweet in cluster {
            seen.claim(content_hash(&tweet.text));
        }
        let cluster_ids: HashSet<&str> = cluster.iter().map(|t| t.id.as_str()).collect();

        let neighbor_sets =
            try_join_all(cluster.iter().map(|tweet| self.neighbors_for(tweet))).await?;

        let mut tag_groups: Vec<&Vec<String>> = Vec::new();
        let mut group_keys: HashSet<String> = HashSet::new();
        for tweet in cluster {
            if let Some(tags) = tweet.tags.as_ref().filter(|t| !t.is_empty()) {
                if group_keys.insert(tags.join("\u{1f}")) {
                    tag_groups.push(tags);
                }
            }
        }
        let search_sets =
            try_join_all(tag_groups.iter().map(|tags| self.keyword_search(tags))).await?;

        let mut local: HashSet<String> = HashSet::new();
        let mut context: Vec<Tweet> = Vec::new();
        for tweet in neighbor_sets.into_iter().chain(search_sets).flatten() {
            if cluster_ids.contains(tweet.id.as_str()) {
                continue;
            }
            let hash = content_hash(&tweet.text);
            if !local.insert(hash.clone()) || !seen.claim(hash) {
                continue;
            }
            context.push(tweet);
        }

        debug!(
            subsystem = "pipeline",
            component = "enrich",
            cluster_size = cluster.len(),
            context = context.len(),
            "Context gathered"
        );
        Ok(context)
    }

    /// Fetch and summarize the first linked article per tweet, attaching
    /// the result as `article_summary`. Tweets already carrying one are
    /// left untouched, so re-running is a no-op.
    pub async fn enrich_articles(&self, tweets: &mut [Tweet]) -> Result<()> {
        let mut positions: Vec<usize> = Vec::new();
        let mut urls: Vec<String> = Vec::new();
        for (i, tweet) in tweets.iter().enumerate() {
            if tweet.article_summary.is_some() {
                continue;
            }
            let article_url = markup::extract_urls(&tweet.text)
                .into_iter()
                .find(|url| !url.contains("twitter.com") && !url.contains("//x.com"));
            if let Some(url) = article_url {
                positions.push(i);
                urls.push(url);
            }
        }
        if urls.is_empty() {
            return Ok(());
        }

        let articles = self.caller.fetch_articles(&urls).await?;
        for (&pos, article) in positions.iter().zip(&articles) {
            let article = match article {
                Some(body) if !body.is_empty() => body,
                _ => continue,
            };
            // ML summarizer when configured, otherwise the LLM chain.
            let summary = match self.caller.summarize_text(article).await {
                Ok(Some(summary)) => summary,
                Ok(None) => self.article_chain.run(article).await?,
                Err(e) => {
                    warn!(
                        subsystem = "pipeline",
                        component = "enrich",
                        op = "summarize_article",
                        error = %e,
                        "Article summarization failed, leaving tweet bare"
                    );
                    continue;
                }
            };
            tweets[pos].article_summary = Some(summary);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use murmur_inference::mock::{MockEmbeddingBackend, MockGenerationBackend};

    use crate::testutil::{InMemoryTweetRepository, StubServiceCaller};

    fn tweet(id: &str, text: &str) -> Tweet {
        Tweet::new(
            id,
            text,
            Utc::now(),
            format!("https://twitter.com/u/status/{id}"),
        )
    }

    fn enricher(repo: InMemoryTweetRepository, caller: StubServiceCaller) -> ContextEnricher {
        ContextEnricher::new(
            Arc::new(repo),
            Arc::new(MockEmbeddingBackend::new(64)),
            Arc::new(caller),
            Arc::new(MockGenerationBackend::with_response("condensed article")),
        )
    }

    #[tokio::test]
    async fn context_excludes_the_cluster_itself() {
        let repo = InMemoryTweetRepository::default()
            .with_tweet(tweet("1", "cluster member"))
            .with_tweet(tweet("n1", "stored neighbor"));
        let enricher = enricher(repo, StubServiceCaller::default());
        let seen = SeenHashes::new();

        let cluster = vec![tweet("1", "cluster member")];
        let context = enricher.gather_context(&cluster, &seen).await.unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].id, "n1");
    }

    #[tokio::test]
    async fn sibling_clusters_never_share_context() {
        let repo = InMemoryTweetRepository::default().with_tweet(tweet("n1", "shared neighbor"));
        let enricher = enricher(repo, StubServiceCaller::default());
        let seen = SeenHashes::new();

        let first = enricher
            .gather_context(&[tweet("1", "alpha")], &seen)
            .await
            .unwrap();
        let second = enricher
            .gather_context(&[tweet("2", "beta")], &seen)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn keyword_search_results_are_merged_and_deduped() {
        let mut tagged = tweet("1", "fish export ban");
        tagged.tags = Some(vec!["fisheries".to_string(), "trade".to_string()]);

        let caller = StubServiceCaller::default().with_search_results(vec![
            tweet("s1", "harvester hit"),
            tweet("s2", "fish export ban"),
        ]);
        let enricher = enricher(InMemoryTweetRepository::default(), caller);
        let seen = SeenHashes::new();

        // s2 duplicates the cluster member's content hash and is dropped.
        let context = enricher.gather_context(&[tagged], &seen).await.unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].id, "s1");
    }

    #[tokio::test]
    async fn articles_are_fetched_summarized_and_attached() {
        let caller = StubServiceCaller::default()
            .with_article("https://apnews.com/article/x", "long article body");
        let enricher = enricher(InMemoryTweetRepository::default(), caller);

        let mut tweets = vec![
            tweet("1", "read this https://apnews.com/article/x"),
            tweet("2", "no links here"),
        ];
        enricher.enrich_articles(&mut tweets).await.unwrap();
        assert_eq!(tweets[0].article_summary.as_deref(), Some("condensed article"));
        assert!(tweets[1].article_summary.is_none());
    }

    #[tokio::test]
    async fn article_enrichment_is_idempotent() {
        let caller = StubServiceCaller::default()
            .with_article("https://apnews.com/article/x", "long article body");
        let enricher = enricher(InMemoryTweetRepository::default(), caller);

        let mut tweets = vec![tweet("1", "read this https://apnews.com/article/x")];
        tweets[0].article_summary = Some("already summarized".to_string());
        enricher.enrich_articles(&mut tweets).await.unwrap();
        assert_eq!(
            tweets[0].article_summary.as_deref(),
            Some("already summarized")
        );
    }

    #[tokio::test]
    async fn twitter_links_are_not_treated_as_articles() {
        let caller = StubServiceCaller::default();
        let enricher = enricher(InMemoryTweetRepository::default(), caller);

        let mut tweets = vec![tweet("1", "quoting https://twitter.com/u/status/5")];
        enricher.enrich_articles(&mut tweets).await.unwrap();
        assert!(tweets[0].article_summary.is_none());
    }

    #[tokio::test]
    async fn ml_summarizer_takes_precedence_over_the_chain() {
        let caller = StubServiceCaller::default()
            .with_article("https://apnews.com/article/x", "body")
            .with_summarized_text("ml summary");
        let enricher = enricher(InMemoryTweetRepository::default(), caller);

        let mut tweets = vec![tweet("1", "see https://apnews.com/article/x")];
        enricher.enrich_articles(&mut tweets).await.unwrap();
        assert_eq!(tweets[0].article_summary.as_deref(), Some("ml summary"));
    }
}
