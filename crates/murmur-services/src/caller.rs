//! Service caller with graceful degradation for optional endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use murmur_core::defaults::SERVICE_TIMEOUT_SECS;
use murmur_core::{Error, Result, Tweet};

/// Header carrying the shared service auth token.
pub const AUTH_HEADER: &str = "auth-token";

/// Client interface the pipeline uses to reach sidecar services.
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    /// Classify each text against the tag set, returning the matching
    /// tags per text. Without a classifier every text gets the full set.
    async fn zero_shot_classification(
        &self,
        texts: &[String],
        tags: &[String],
    ) -> Result<Vec<Vec<String>>>;

    /// Rerank `queries` against `base_passage`, returning indices in
    /// relevance order. Without a reranker the order is unchanged.
    async fn cross_encoder_rerank(
        &self,
        base_passage: &str,
        queries: &[String],
    ) -> Result<Vec<usize>>;

    /// Run a keyword search on the harvester over a date window.
    async fn search_relevant_tweets(
        &self,
        keywords: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
    ) -> Result<Vec<Tweet>>;

    /// Trigger a harvester scrape of the configured feeds.
    async fn scrape_tweets(&self) -> Result<Vec<Tweet>>;

    /// Summarize text via the ML summarizer. `None` when unconfigured.
    async fn summarize_text(&self, text: &str) -> Result<Option<String>>;

    /// Fetch article bodies for the given URLs, position-aligned.
    /// Without a fetcher every position is `None`.
    async fn fetch_articles(&self, urls: &[String]) -> Result<Vec<Option<String>>>;
}

/// Configuration for [`HttpServiceCaller`].
#[derive(Debug, Clone)]
pub struct ServiceCallerConfig {
    /// Harvester base URL. Required.
    pub harvester_url: String,
    /// ML sidecar base URL (classification + reranking). Optional.
    pub ml_url: Option<String>,
    /// Article fetcher base URL. Optional.
    pub article_fetcher_url: Option<String>,
    /// ML summarizer base URL. Optional.
    pub summarizer_url: Option<String>,
    /// Shared auth token sent as the `auth-token` header when set.
    pub auth_token: Option<String>,
    /// Gate for zero-shot classification even when `ml_url` is set.
    pub classify_enabled: bool,
    /// Gate for reranking even when `ml_url` is set.
    pub rerank_enabled: bool,
    pub timeout_seconds: u64,
}

impl ServiceCallerConfig {
    /// Read configuration from the environment.
    ///
    /// `HARVESTER_URL` is required; everything else is optional.
    pub fn from_env() -> Result<Self> {
        let harvester_url = std::env::var("HARVESTER_URL")
            .map_err(|_| Error::Config("HARVESTER_URL not set".to_string()))?;

        fn non_empty(var: &str) -> Option<String> {
            std::env::var(var).ok().filter(|v| !v.is_empty())
        }

        Ok(Self {
            harvester_url,
            ml_url: non_empty("ML_URL"),
            article_fetcher_url: non_empty("ARTICLE_FETCHER_URL"),
            summarizer_url: non_empty("SUMMARIZER_URL"),
            auth_token: non_empty("AUTH_TOKEN"),
            classify_enabled: std::env::var("ZERO_SHOT_CLASSIFY_TWEETS")
                .map(|v| v == "true")
                .unwrap_or(false),
            rerank_enabled: std::env::var("RERANK_VECTOR_SEARCH_RESULTS")
                .map(|v| v == "true")
                .unwrap_or(false),
            timeout_seconds: std::env::var("SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(SERVICE_TIMEOUT_SECS),
        })
    }
}

/// HTTP implementation of [`ServiceCaller`].
pub struct HttpServiceCaller {
    client: Client,
    config: ServiceCallerConfig,
}

#[derive(Deserialize)]
struct StatusResult<T> {
    #[allow(dead_code)]
    status: String,
    result: T,
}

#[derive(Deserialize)]
struct TweetsEnvelope {
    tweets: Vec<Tweet>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    base_passage: &'a str,
    queries: &'a [String],
}

impl HttpServiceCaller {
    pub fn new(config: ServiceCallerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {e}")))?;

        info!(
            subsystem = "services",
            component = "caller",
            harvester_url = %config.harvester_url,
            ml_configured = config.ml_url.is_some(),
            article_fetcher_configured = config.article_fetcher_url.is_some(),
            summarizer_configured = config.summarizer_url.is_some(),
            "Initializing service caller"
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ServiceCallerConfig::from_env()?)
    }

    fn post(&self, base: &str, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", base.trim_end_matches('/'), path);
        let mut req = self.client.post(&url);
        if let Some(token) = self.config.auth_token.as_deref().filter(|t| !t.is_empty()) {
            req = req.header(AUTH_HEADER, token);
        }
        req
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::Request(format!("{what} request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "{what} request failed with {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Request(format!("Invalid {what} response: {e}")))
    }
}

#[async_trait]
impl ServiceCaller for HttpServiceCaller {
    async fn zero_shot_classification(
        &self,
        texts: &[String],
        tags: &[String],
    ) -> Result<Vec<Vec<String>>> {
        let ml_url = match (&self.config.ml_url, self.config.classify_enabled) {
            (Some(url), true) => url,
            _ => {
                debug!(
                    subsystem = "services",
                    component = "caller",
                    op = "zero_shot_classification",
                    texts = texts.len(),
                    "Classifier not configured, assigning full tag set"
                );
                return Ok(texts.iter().map(|_| tags.to_vec()).collect());
            }
        };

        let body = json!({ "queries": texts, "classes": tags });
        let parsed: StatusResult<Vec<Vec<String>>> = self
            .send_json(self.post(ml_url, "/classify").json(&body), "classify")
            .await?;
        if parsed.result.len() != texts.len() {
            return Err(Error::Request(format!(
                "Classifier returned {} results for {} texts",
                parsed.result.len(),
                texts.len()
            )));
        }
        Ok(parsed.result)
    }

    async fn cross_encoder_rerank(
        &self,
        base_passage: &str,
        queries: &[String],
    ) -> Result<Vec<usize>> {
        let ml_url = match (&self.config.ml_url, self.config.rerank_enabled) {
            (Some(url), true) => url,
            _ => return Ok((0..queries.len()).collect()),
        };

        let body = RerankRequest {
            base_passage,
            queries,
        };
        let indices: Vec<usize> = self
            .send_json(self.post(ml_url, "/rerank").json(&body), "rerank")
            .await?;
        Ok(indices)
    }

    async fn search_relevant_tweets(
        &self,
        keywords: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
    ) -> Result<Vec<Tweet>> {
        let body = json!({
            "searchTerms": keywords,
            "fromDate": from_date.to_rfc3339(),
            "toDate": to_date.to_rfc3339(),
        });
        let envelope: TweetsEnvelope = self
            .send_json(
                self.post(&self.config.harvester_url, "/search-relevant-tweets")
                    .json(&body),
                "search-relevant-tweets",
            )
            .await?;
        debug!(
            subsystem = "services",
            component = "caller",
            op = "search_relevant_tweets",
            keywords = %keywords,
            found = envelope.tweets.len(),
            "Keyword search complete"
        );
        Ok(envelope.tweets)
    }

    async fn scrape_tweets(&self) -> Result<Vec<Tweet>> {
        let envelope: TweetsEnvelope = self
            .send_json(
                self.post(&self.config.harvester_url, "/scrape-tweets")
                    .json(&json!({})),
                "scrape-tweets",
            )
            .await?;
        Ok(envelope.tweets)
    }

    async fn summarize_text(&self, text: &str) -> Result<Option<String>> {
        let url = match &self.config.summarizer_url {
            Some(url) => url,
            None => return Ok(None),
        };
        let parsed: StatusResult<String> = self
            .send_json(
                self.post(url, "/").json(&json!({ "text": text })),
                "summarize",
            )
            .await?;
        Ok(Some(parsed.result))
    }

    async fn fetch_articles(&self, urls: &[String]) -> Result<Vec<Option<String>>> {
        let fetcher_url = match &self.config.article_fetcher_url {
            Some(url) => url,
            None => {
                warn!(
                    subsystem = "services",
                    component = "caller",
                    op = "fetch_articles",
                    urls = urls.len(),
                    "Article fetcher not configured, skipping articles"
                );
                return Ok(vec![None; urls.len()]);
            }
        };
        let parsed: StatusResult<Vec<Option<String>>> = self
            .send_json(
                self.post(fetcher_url, "/").json(&json!({ "urls": urls })),
                "fetch-articles",
            )
            .await?;
        if parsed.result.len() != urls.len() {
            return Err(Error::Request(format!(
                "Article fetcher returned {} results for {} urls",
                parsed.result.len(),
                urls.len()
            )));
        }
        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(harvester: &str) -> ServiceCallerConfig {
        ServiceCallerConfig {
            harvester_url: harvester.to_string(),
            ml_url: None,
            article_fetcher_url: None,
            summarizer_url: None,
            auth_token: None,
            classify_enabled: true,
            rerank_enabled: true,
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn classification_without_ml_assigns_full_tag_set() {
        let caller = HttpServiceCaller::new(config("http://harvester.local")).unwrap();
        let texts = vec!["a".to_string(), "b".to_string()];
        let tags = vec!["economy".to_string(), "weather".to_string()];

        let result = caller.zero_shot_classification(&texts, &tags).await.unwrap();
        assert_eq!(result, vec![tags.clone(), tags]);
    }

    #[tokio::test]
    async fn classification_disabled_by_gate_even_with_ml_url() {
        let mut cfg = config("http://harvester.local");
        cfg.ml_url = Some("http://ml.local".to_string());
        cfg.classify_enabled = false;
        let caller = HttpServiceCaller::new(cfg).unwrap();

        let texts = vec!["a".to_string()];
        let tags = vec!["economy".to_string()];
        let result = caller.zero_shot_classification(&texts, &tags).await.unwrap();
        assert_eq!(result, vec![tags]);
    }

    #[tokio::test]
    async fn rerank_without_ml_is_identity() {
        let caller = HttpServiceCaller::new(config("http://harvester.local")).unwrap();
        let queries = vec!["x".to_string(), "y".to_string(), "z".to_string()];

        let order = caller.cross_encoder_rerank("base", &queries).await.unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn summarize_without_endpoint_is_none() {
        let caller = HttpServiceCaller::new(config("http://harvester.local")).unwrap();
        assert_eq!(caller.summarize_text("long article").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_articles_without_endpoint_is_all_none() {
        let caller = HttpServiceCaller::new(config("http://harvester.local")).unwrap();
        let urls = vec!["https://example.com/a".to_string(); 3];
        assert_eq!(caller.fetch_articles(&urls).await.unwrap(), vec![None; 3]);
    }

    #[test]
    fn from_env_requires_harvester_url() {
        std::env::remove_var("HARVESTER_URL");
        let err = ServiceCallerConfig::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
