//! Tweet serialization for LLM prompts and URL helpers.
//!
//! Tweets are serialized as tagged markup so chains can reference tweets
//! by ID and the summarizer can cite status URLs. Media annotations (OCR
//! text, captions) ride along when present.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Tweet;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("static regex"))
}

fn space_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("static regex"))
}

/// Serialize a batch of tweets into `<tweet>` markup for prompt bodies.
pub fn serialize_tweets(tweets: &[Tweet]) -> String {
    let mut out = String::new();
    for tweet in tweets {
        out.push_str("<tweet><id>");
        out.push_str(&tweet.id);
        out.push_str("</id><text>");
        out.push_str(&tweet.text);
        out.push_str("</text><date>");
        out.push_str(&tweet.date.to_rfc3339());
        out.push_str("</date><url>");
        out.push_str(&tweet.url);
        out.push_str("</url>");
        if let Some(media) = &tweet.media {
            for m in media {
                if !m.text.is_empty() {
                    out.push_str("<media_text>");
                    out.push_str(&m.text.join(" "));
                    out.push_str("</media_text>");
                }
                if !m.caption.is_empty() {
                    out.push_str("<media_caption>");
                    out.push_str(&m.caption.join(" "));
                    out.push_str("</media_caption>");
                }
            }
        }
        if let Some(article) = &tweet.article_summary {
            out.push_str("<article_summary>");
            out.push_str(article);
            out.push_str("</article_summary>");
        }
        out.push_str("</tweet>");
    }
    out
}

/// Remove URLs from tweet text and collapse the leftover whitespace.
///
/// Zero-shot classification scores drop when raw links are left in the
/// input, so classifier preprocessing strips them.
pub fn strip_urls(text: &str) -> String {
    let without = url_regex().replace_all(text, "");
    space_regex().replace_all(&without, " ").into_owned()
}

/// Extract every http(s) URL mentioned in a text.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Extract the status ID from a tweet URL: the last non-empty path segment.
///
/// `https://twitter.com/CNN/status/1740773713295905066` → `1740773713295905066`.
pub fn status_id(url: &str) -> Option<String> {
    let path = url.split("://").nth(1)?;
    let without_query = path.split(['?', '#']).next().unwrap_or(path);
    let mut segments = without_query.split('/').filter(|s| !s.is_empty());
    let _host = segments.next()?;
    segments.last().map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TweetMedia;
    use chrono::Utc;

    #[test]
    fn test_serialize_contains_id_text_url() {
        let tweet = Tweet::new(
            "t1",
            "storm incoming",
            Utc::now(),
            "https://twitter.com/AP/status/42",
        );
        let markup = serialize_tweets(&[tweet]);
        assert!(markup.contains("<id>t1</id>"));
        assert!(markup.contains("<text>storm incoming</text>"));
        assert!(markup.contains("<url>https://twitter.com/AP/status/42</url>"));
    }

    #[test]
    fn test_serialize_includes_media_annotations() {
        let mut tweet = Tweet::new("t1", "see image", Utc::now(), "https://x.com/a/status/1");
        tweet.media = Some(vec![TweetMedia {
            text: vec!["SIGN TEXT".into()],
            caption: vec!["a road sign".into()],
        }]);
        let markup = serialize_tweets(&[tweet]);
        assert!(markup.contains("<media_text>SIGN TEXT</media_text>"));
        assert!(markup.contains("<media_caption>a road sign</media_caption>"));
    }

    #[test]
    fn test_strip_urls_collapses_spaces() {
        let cleaned = strip_urls("breaking news  https://t.co/abc123 more text");
        assert_eq!(cleaned, "breaking news more text");
    }

    #[test]
    fn test_extract_urls_finds_all() {
        let urls = extract_urls("read https://a.example/x and http://b.example/y now");
        assert_eq!(urls, vec!["https://a.example/x", "http://b.example/y"]);
    }

    #[test]
    fn test_status_id_last_segment() {
        assert_eq!(
            status_id("https://twitter.com/CNN/status/1740773713295905066"),
            Some("1740773713295905066".to_string())
        );
    }

    #[test]
    fn test_status_id_trailing_slash() {
        assert_eq!(
            status_id("https://twitter.com/CNN/status/123/"),
            Some("123".to_string())
        );
    }

    #[test]
    fn test_status_id_no_path() {
        assert_eq!(status_id("https://twitter.com"), None);
    }
}
