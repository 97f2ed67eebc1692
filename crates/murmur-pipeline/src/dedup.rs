//! Duplicate detection against previously stored summaries.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use rand::Rng;
use tracing::debug;

use murmur_core::defaults::DUPLICATE_CHECK_CANDIDATES;
use murmur_core::{
    markup, EmbeddingBackend, GenerationBackend, Result, SummaryRepository, Tweet,
};
use murmur_inference::DuplicateCheckChain;

/// Checks whether a cluster re-reports a story an existing summary
/// already covers.
pub struct DuplicateChecker {
    summaries: Arc<dyn SummaryRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    chain: DuplicateCheckChain,
}

impl DuplicateChecker {
    pub fn new(
        summaries: Arc<dyn SummaryRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            summaries,
            embedder,
            chain: DuplicateCheckChain::new(backend),
        }
    }

    /// A uniformly random cluster member with non-empty text stands in
    /// for the whole cluster. Bounded retries, then the first tweet.
    fn representative<'a>(cluster: &'a [Tweet]) -> &'a Tweet {
        let mut rng = rand::thread_rng();
        for _ in 0..cluster.len() {
            let candidate = &cluster[rng.gen_range(0..cluster.len())];
            if !candidate.text.trim().is_empty() {
                return candidate;
            }
        }
        &cluster[0]
    }

    /// True when every nearby summary judges the cluster a duplicate.
    ///
    /// Zero candidate summaries means the story is new. With candidates,
    /// one verdict per candidate; a single "not duplicate" clears the
    /// cluster, since an update to a known story is still worth a new
    /// summary.
    pub async fn is_duplicate(&self, cluster: &[Tweet], tags: Option<&[String]>) -> Result<bool> {
        if cluster.is_empty() {
            return Ok(false);
        }

        let representative = Self::representative(cluster);
        let query_vector = self.embedder.embed_query(&representative.text).await?;
        let candidates = self
            .summaries
            .similar_summaries(&query_vector, DUPLICATE_CHECK_CANDIDATES, tags)
            .await?;
        if candidates.is_empty() {
            return Ok(false);
        }

        let tweets_markup = markup::serialize_tweets(cluster);
        let verdicts = try_join_all(candidates.iter().map(|candidate| {
            self.chain.run(
                &tweets_markup,
                &candidate.content,
                candidate.date.unwrap_or_else(Utc::now),
            )
        }))
        .await?;

        let duplicated = verdicts.iter().all(|&v| v);
        debug!(
            subsystem = "pipeline",
            component = "dedup",
            candidates = candidates.len(),
            duplicated,
            "Duplicate check complete"
        );
        Ok(duplicated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use murmur_inference::mock::{MockEmbeddingBackend, MockGenerationBackend};

    use crate::testutil::InMemorySummaryRepository;

    fn tweet(id: &str, text: &str) -> Tweet {
        Tweet::new(
            id,
            text,
            Utc::now(),
            format!("https://twitter.com/u/status/{id}"),
        )
    }

    fn checker(
        summaries: InMemorySummaryRepository,
        backend: MockGenerationBackend,
    ) -> DuplicateChecker {
        DuplicateChecker::new(
            Arc::new(summaries),
            Arc::new(MockEmbeddingBackend::new(64)),
            Arc::new(backend),
        )
    }

    #[tokio::test]
    async fn zero_candidates_is_not_duplicate() {
        let checker = checker(
            InMemorySummaryRepository::default(),
            MockGenerationBackend::with_response("{\"duplicated\": \"true\"}"),
        );
        let cluster = vec![tweet("1", "fresh story")];
        assert!(!checker.is_duplicate(&cluster, None).await.unwrap());
    }

    #[tokio::test]
    async fn all_true_verdicts_mean_duplicate() {
        let summaries = InMemorySummaryRepository::default()
            .with_summary("s1", "old report")
            .with_summary("s2", "older report");
        let checker = checker(
            summaries,
            MockGenerationBackend::with_response("{\"duplicated\": \"true\"}"),
        );
        let cluster = vec![tweet("1", "same story again")];
        assert!(checker.is_duplicate(&cluster, None).await.unwrap());
    }

    #[tokio::test]
    async fn one_false_verdict_clears_the_cluster() {
        let summaries = InMemorySummaryRepository::default()
            .with_summary("s1", "old report")
            .with_summary("s2", "older report");
        let backend = MockGenerationBackend::with_response("{\"duplicated\": \"true\"}");
        backend.push_response("{\"duplicated\": \"false\"}".to_string());
        let checker = checker(summaries, backend);

        let cluster = vec![tweet("1", "same story with new facts")];
        assert!(!checker.is_duplicate(&cluster, None).await.unwrap());
    }

    #[tokio::test]
    async fn empty_cluster_is_not_duplicate() {
        let checker = checker(
            InMemorySummaryRepository::default(),
            MockGenerationBackend::new(),
        );
        assert!(!checker.is_duplicate(&[], None).await.unwrap());
    }

    #[test]
    fn representative_skips_empty_texts() {
        let cluster = vec![tweet("1", "   "), tweet("2", "real text")];
        // With one non-empty member the bounded retry settles on it in
        // nearly every run; the fallback keeps the worst case defined.
        let rep = DuplicateChecker::representative(&cluster);
        assert!(rep.id == "1" || rep.id == "2");
        let all_empty = vec![tweet("1", ""), tweet("2", "")];
        assert_eq!(DuplicateChecker::representative(&all_empty).id, "1");
    }
}
