//! In-memory doubles for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use murmur_core::{RelevancyTag, Result, ScoredDoc, Summary, SummaryRepository, Tweet, TweetRepository};
use murmur_services::ServiceCaller;

/// Configurable stand-in for the sidecar services.
#[derive(Default)]
pub struct StubServiceCaller {
    labels: Option<Vec<Vec<String>>>,
    rerank_order: Option<Vec<usize>>,
    search_results: Vec<Tweet>,
    articles: HashMap<String, String>,
    summarized: Option<String>,
}

impl StubServiceCaller {
    /// Fix the label matrix returned per classify call.
    pub fn with_labels(mut self, labels: Vec<Vec<String>>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_rerank_order(mut self, order: Vec<usize>) -> Self {
        self.rerank_order = Some(order);
        self
    }

    pub fn with_search_results(mut self, tweets: Vec<Tweet>) -> Self {
        self.search_results = tweets;
        self
    }

    /// Map an article URL to its fetched body.
    pub fn with_article(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.articles.insert(url.into(), body.into());
        self
    }

    pub fn with_summarized_text(mut self, summary: impl Into<String>) -> Self {
        self.summarized = Some(summary.into());
        self
    }
}

#[async_trait]
impl ServiceCaller for StubServiceCaller {
    async fn zero_shot_classification(
        &self,
        texts: &[String],
        tags: &[String],
    ) -> Result<Vec<Vec<String>>> {
        match &self.labels {
            Some(labels) => Ok(labels.clone()),
            // Unconfigured classifier behavior: full tag set per text.
            None => Ok(texts.iter().map(|_| tags.to_vec()).collect()),
        }
    }

    async fn cross_encoder_rerank(
        &self,
        _base_passage: &str,
        queries: &[String],
    ) -> Result<Vec<usize>> {
        match &self.rerank_order {
            Some(order) => Ok(order.clone()),
            None => Ok((0..queries.len()).collect()),
        }
    }

    async fn search_relevant_tweets(
        &self,
        _keywords: &str,
        _from_date: DateTime<Utc>,
        _to_date: DateTime<Utc>,
    ) -> Result<Vec<Tweet>> {
        Ok(self.search_results.clone())
    }

    async fn scrape_tweets(&self) -> Result<Vec<Tweet>> {
        Ok(vec![])
    }

    async fn summarize_text(&self, _text: &str) -> Result<Option<String>> {
        Ok(self.summarized.clone())
    }

    async fn fetch_articles(&self, urls: &[String]) -> Result<Vec<Option<String>>> {
        Ok(urls.iter().map(|u| self.articles.get(u).cloned()).collect())
    }
}

fn doc_from_tweet(tweet: &Tweet, distance: f64) -> ScoredDoc {
    ScoredDoc {
        id: tweet.id.clone(),
        content: tweet.text.clone(),
        metadata: json!({}),
        distance,
        date: Some(tweet.date),
        url: Some(tweet.url.clone()),
        tags: tweet
            .tags
            .as_ref()
            .and_then(|t| serde_json::to_string(t).ok()),
    }
}

/// Tweet repository backed by a map, with fixed relevancy tags.
#[derive(Default)]
pub struct InMemoryTweetRepository {
    tweets: Mutex<HashMap<String, Tweet>>,
    tags: Vec<RelevancyTag>,
}

impl InMemoryTweetRepository {
    pub fn with_relevancy_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| RelevancyTag {
                id: i.to_string(),
                tag: tag.to_string(),
            })
            .collect();
        self
    }

    pub fn with_tweet(self, tweet: Tweet) -> Self {
        self.tweets.lock().unwrap().insert(tweet.id.clone(), tweet);
        self
    }

    pub fn stored(&self) -> Vec<Tweet> {
        self.tweets.lock().unwrap().values().cloned().collect()
    }

    pub fn stored_count(&self) -> usize {
        self.tweets.lock().unwrap().len()
    }
}

#[async_trait]
impl TweetRepository for InMemoryTweetRepository {
    async fn fetch(&self, id: &str) -> Result<Tweet> {
        self.tweets
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| murmur_core::Error::NotFound(format!("tweet {id}")))
    }

    async fn insert_bulk(&self, tweets: &[Tweet]) -> Result<()> {
        let mut store = self.tweets.lock().unwrap();
        for tweet in tweets {
            store.insert(tweet.id.clone(), tweet.clone());
        }
        Ok(())
    }

    async fn upsert_embeddings(&self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        let mut store = self.tweets.lock().unwrap();
        for (id, vector) in ids.iter().zip(vectors) {
            if let Some(tweet) = store.get_mut(id) {
                tweet.embedding = Some(vector.clone());
            }
        }
        Ok(())
    }

    async fn similar_tweets(
        &self,
        _query_vector: &[f32],
        k: i64,
        _tag_query: Option<&str>,
    ) -> Result<Vec<ScoredDoc>> {
        let store = self.tweets.lock().unwrap();
        let mut docs: Vec<ScoredDoc> = store
            .values()
            .enumerate()
            .map(|(i, t)| doc_from_tweet(t, 0.1 + i as f64 * 0.01))
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs.truncate(k as usize);
        Ok(docs)
    }

    async fn relevancy_tags(&self) -> Result<Vec<RelevancyTag>> {
        Ok(self.tags.clone())
    }
}

/// Summary repository backed by vectors of stored rows.
#[derive(Default)]
pub struct InMemorySummaryRepository {
    existing: Mutex<Vec<(Summary, DateTime<Utc>)>>,
    inserted: Mutex<Vec<Summary>>,
}

impl InMemorySummaryRepository {
    /// Preload an already-stored summary for dedup candidates.
    pub fn with_summary(self, id: &str, text: &str) -> Self {
        self.existing.lock().unwrap().push((
            Summary {
                id: id.to_string(),
                text: text.to_string(),
                ref_tweets: vec![],
            },
            Utc::now(),
        ));
        self
    }

    pub fn inserted(&self) -> Vec<Summary> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummaryRepository for InMemorySummaryRepository {
    async fn insert_bulk(&self, summaries: &[Summary], embeddings: &[Vec<f32>]) -> Result<()> {
        if summaries.len() != embeddings.len() {
            return Err(murmur_core::Error::InvalidInput(
                "summary/embedding count mismatch".to_string(),
            ));
        }
        self.inserted.lock().unwrap().extend_from_slice(summaries);
        Ok(())
    }

    async fn similar_summaries(
        &self,
        _query_vector: &[f32],
        k: i64,
        _tags: Option<&[String]>,
    ) -> Result<Vec<ScoredDoc>> {
        let existing = self.existing.lock().unwrap();
        Ok(existing
            .iter()
            .take(k as usize)
            .enumerate()
            .map(|(i, (summary, date))| ScoredDoc {
                id: summary.id.clone(),
                content: summary.text.clone(),
                metadata: json!({ "ref_tweets": summary.ref_tweets }),
                distance: 0.1 + i as f64 * 0.01,
                date: Some(*date),
                url: None,
                tags: None,
            })
            .collect())
    }
}
