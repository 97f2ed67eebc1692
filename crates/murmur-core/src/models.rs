//! Data model for the murmur pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// OCR text and captions extracted from a tweet's attached media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetMedia {
    /// OCR-extracted text fragments.
    #[serde(default)]
    pub text: Vec<String>,
    /// Image captions.
    #[serde(default)]
    pub caption: Vec<String>,
}

/// A harvested tweet.
///
/// Created by the harvester with `id` derived from a content hash (or
/// supplied externally). The pipeline attaches `tags`, `embedding`, and
/// `article_summary` before persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    /// Unique identifier. Assigned by the orchestrator when missing.
    #[serde(default)]
    pub id: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<TweetMedia>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_summary: Option<String>,
}

impl Tweet {
    /// Build a bare tweet with no enrichment attached.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        date: DateTime<Utc>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            date,
            url: url.into(),
            tags: None,
            embedding: None,
            media: None,
            article_summary: None,
        }
    }
}

/// A stored topic summary with provenance back to its source tweets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Freshly generated per summary (UUID v4).
    pub id: String,
    /// Markdown summary text.
    pub text: String,
    /// IDs of the tweets the summary cites. Never empty.
    pub ref_tweets: Vec<String>,
}

/// An operator-curated topic of interest, read from the relevancy tags
/// table once per pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevancyTag {
    pub id: String,
    pub tag: String,
}

/// One ranked hit from a vector store similarity search.
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub id: String,
    /// The content column (tweet text or summary text).
    pub content: String,
    /// Row metadata (jsonb column).
    pub metadata: JsonValue,
    /// Raw distance under the store's configured metric. Lower is closer.
    pub distance: f64,
    pub date: Option<DateTime<Utc>>,
    pub url: Option<String>,
    /// JSON-encoded tag list, as stored.
    pub tags: Option<String>,
}

impl ScoredDoc {
    /// Reconstruct a `Tweet` from a tweet-store search hit.
    ///
    /// Hits carry no embedding; callers re-embed if they need one.
    pub fn into_tweet(self) -> Tweet {
        let tags = self
            .tags
            .as_deref()
            .filter(|t| !t.is_empty())
            .and_then(|t| serde_json::from_str::<Vec<String>>(t).ok());
        Tweet {
            id: self.id,
            text: self.content,
            date: self.date.unwrap_or_else(Utc::now),
            url: self.url.unwrap_or_default(),
            tags,
            embedding: None,
            media: None,
            article_summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_scored_doc_into_tweet_parses_tags() {
        let doc = ScoredDoc {
            id: "t1".into(),
            content: "storm warning".into(),
            metadata: serde_json::json!({}),
            distance: 0.1,
            date: Some(Utc::now()),
            url: Some("https://twitter.com/ab/status/99".into()),
            tags: Some(r#"["weather","emergency"]"#.into()),
        };
        let tweet = doc.into_tweet();
        assert_eq!(
            tweet.tags,
            Some(vec!["weather".to_string(), "emergency".to_string()])
        );
        assert_eq!(tweet.text, "storm warning");
    }

    #[test]
    fn test_scored_doc_into_tweet_empty_tags() {
        let doc = ScoredDoc {
            id: "t2".into(),
            content: "hello".into(),
            metadata: serde_json::json!({}),
            distance: 0.5,
            date: None,
            url: None,
            tags: Some(String::new()),
        };
        assert_eq!(doc.into_tweet().tags, None);
    }

    #[test]
    fn test_tweet_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "abc",
            "text": "hi",
            "date": "2024-01-01T00:00:00Z",
            "url": "https://twitter.com/x/status/1"
        }"#;
        let tweet: Tweet = serde_json::from_str(json).unwrap();
        assert!(tweet.tags.is_none());
        assert!(tweet.embedding.is_none());
        assert!(tweet.media.is_none());
    }
}
