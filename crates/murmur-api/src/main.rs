//! murmur-api - HTTP entry point for the tweet processing pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use murmur_core::{EmbeddingBackend, GenerationBackend, Tweet, TweetRepository};
use murmur_db::pool::{connect_with_retry, PoolConfig};
use murmur_db::{PgSummaryRepository, PgTweetRepository};
use murmur_inference::OpenAIBackend;
use murmur_pipeline::{
    ClassifierAggregator, ClassifierStrategy, LlmClassifierAggregator, Pipeline, PipelineDeps,
    ZeroShotClassifierAggregator,
};
use murmur_services::{HttpServiceCaller, ServiceCaller};

/// Shared secret header, mirrored from the sibling services.
const AUTH_HEADER: &str = "auth-token";

struct AppState {
    pipeline: Pipeline,
    tweets: Arc<dyn TweetRepository>,
    caller: Arc<dyn ServiceCaller>,
    auth_token: Option<String>,
}

impl AppState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if let Some(expected) = &self.auth_token {
            let provided = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok());
            if provided != Some(expected.as_str()) {
                return Err(ApiError::Unauthorized);
            }
        }
        Ok(())
    }
}

/// Body for `POST /process-tweets`: raw tweets XOR stored tweet ids.
#[derive(Deserialize)]
struct ProcessRequest {
    tweets: Option<Vec<Tweet>>,
    ids: Option<Vec<String>>,
}

enum ApiError {
    Unauthorized,
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(json!({ "status": "error", "error": message }))).into_response()
    }
}

async fn process_tweets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.authorize(&headers)?;

    let tweets = match (request.tweets, request.ids) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "provide either tweets or ids, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "either tweets or ids is required".to_string(),
            ));
        }
        (Some(tweets), None) => tweets,
        (None, Some(ids)) => {
            let mut fetched = Vec::with_capacity(ids.len());
            for id in &ids {
                let tweet = state.tweets.fetch(id).await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to fetch tweet {id}: {e}"))
                })?;
                fetched.push(tweet);
            }
            fetched
        }
    };

    run_pipeline(&state, tweets).await
}

/// Pull a fresh harvest from the harvester and push it through the
/// pipeline in one shot. Body-less companion to `/process-tweets`.
async fn scrape_and_process(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.authorize(&headers)?;

    let tweets = state
        .caller
        .scrape_tweets()
        .await
        .map_err(|e| ApiError::BadRequest(format!("scrape failed: {e}")))?;
    info!(
        subsystem = "api",
        component = "scrape_and_process",
        scraped = tweets.len(),
        "Scraped tweets from the harvester"
    );
    run_pipeline(&state, tweets).await
}

async fn run_pipeline(
    state: &AppState,
    tweets: Vec<Tweet>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.pipeline.process_tweets(tweets).await {
        Ok(()) => Ok(Json(json!({ "status": "success" }))),
        Err(e) => {
            error!(
                subsystem = "api",
                component = "pipeline",
                error = %e,
                "Pipeline run failed"
            );
            Err(ApiError::BadRequest(e.to_string()))
        }
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process-tweets", post(process_tweets))
        .route("/scrape-and-process", post(scrape_and_process))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "murmur_api=debug,murmur_pipeline=debug,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/murmur".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);
    let auth_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());

    let pool = connect_with_retry(&database_url, PoolConfig::default()).await?;

    let backend = Arc::new(OpenAIBackend::from_env()?);
    let dims = EmbeddingBackend::dimension(backend.as_ref());

    let tweet_repo = Arc::new(PgTweetRepository::new(pool.clone(), dims)?);
    let summary_repo = Arc::new(PgSummaryRepository::new(pool, dims)?);
    tweet_repo.ensure_schema().await?;
    summary_repo.ensure_schema().await?;
    tweet_repo.create_hnsw_index().await?;
    summary_repo.create_hnsw_index().await?;

    let caller: Arc<dyn ServiceCaller> = Arc::new(HttpServiceCaller::from_env()?);

    let strategy_name =
        std::env::var("CLASSIFIER_STRATEGY").unwrap_or_else(|_| "llm".to_string());
    let strategy: Arc<dyn ClassifierAggregator> =
        match ClassifierStrategy::from_config(&strategy_name) {
            ClassifierStrategy::ZeroShot => {
                Arc::new(ZeroShotClassifierAggregator::new(caller.clone()))
            }
            ClassifierStrategy::Llm => Arc::new(LlmClassifierAggregator::new(
                backend.clone() as Arc<dyn GenerationBackend>
            )),
        };

    let pipeline = Pipeline::new(PipelineDeps {
        tweets: tweet_repo.clone(),
        summaries: summary_repo,
        embedder: backend.clone(),
        generation: backend,
        caller: caller.clone(),
        strategy,
    });

    let state = Arc::new(AppState {
        pipeline,
        tweets: tweet_repo,
        caller,
        auth_token,
    });
    let router = build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(
        subsystem = "api",
        component = "server",
        %addr,
        strategy = %strategy_name,
        "murmur-api listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use tower::ServiceExt;

    use async_trait::async_trait;
    use murmur_core::{
        RelevancyTag, Result as CoreResult, ScoredDoc, Summary, SummaryRepository,
    };
    use murmur_inference::mock::{MockEmbeddingBackend, MockGenerationBackend};

    #[derive(Default)]
    struct EmptyTweetRepo;

    #[async_trait]
    impl TweetRepository for EmptyTweetRepo {
        async fn fetch(&self, id: &str) -> CoreResult<Tweet> {
            Err(murmur_core::Error::NotFound(format!("tweet {id}")))
        }
        async fn insert_bulk(&self, _tweets: &[Tweet]) -> CoreResult<()> {
            Ok(())
        }
        async fn upsert_embeddings(
            &self,
            _ids: &[String],
            _vectors: &[Vec<f32>],
        ) -> CoreResult<()> {
            Ok(())
        }
        async fn similar_tweets(
            &self,
            _query_vector: &[f32],
            _k: i64,
            _tag_query: Option<&str>,
        ) -> CoreResult<Vec<ScoredDoc>> {
            Ok(vec![])
        }
        async fn relevancy_tags(&self) -> CoreResult<Vec<RelevancyTag>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct EmptySummaryRepo;

    #[async_trait]
    impl SummaryRepository for EmptySummaryRepo {
        async fn insert_bulk(
            &self,
            _summaries: &[Summary],
            _embeddings: &[Vec<f32>],
        ) -> CoreResult<()> {
            Ok(())
        }
        async fn similar_summaries(
            &self,
            _query_vector: &[f32],
            _k: i64,
            _tags: Option<&[String]>,
        ) -> CoreResult<Vec<ScoredDoc>> {
            Ok(vec![])
        }
    }

    struct NullCaller;

    #[async_trait]
    impl ServiceCaller for NullCaller {
        async fn zero_shot_classification(
            &self,
            texts: &[String],
            tags: &[String],
        ) -> CoreResult<Vec<Vec<String>>> {
            Ok(texts.iter().map(|_| tags.to_vec()).collect())
        }
        async fn cross_encoder_rerank(
            &self,
            _base_passage: &str,
            queries: &[String],
        ) -> CoreResult<Vec<usize>> {
            Ok((0..queries.len()).collect())
        }
        async fn search_relevant_tweets(
            &self,
            _keywords: &str,
            _from: chrono::DateTime<Utc>,
            _to: chrono::DateTime<Utc>,
        ) -> CoreResult<Vec<Tweet>> {
            Ok(vec![])
        }
        async fn scrape_tweets(&self) -> CoreResult<Vec<Tweet>> {
            Ok(vec![])
        }
        async fn summarize_text(&self, _text: &str) -> CoreResult<Option<String>> {
            Ok(None)
        }
        async fn fetch_articles(&self, urls: &[String]) -> CoreResult<Vec<Option<String>>> {
            Ok(vec![None; urls.len()])
        }
    }

    fn test_state(auth_token: Option<String>) -> Arc<AppState> {
        let tweets: Arc<dyn TweetRepository> = Arc::new(EmptyTweetRepo);
        let caller: Arc<dyn ServiceCaller> = Arc::new(NullCaller);
        let generation: Arc<dyn GenerationBackend> = Arc::new(
            MockGenerationBackend::with_response(r#"{"aggregated_tweets": []}"#),
        );
        let pipeline = Pipeline::new(PipelineDeps {
            tweets: tweets.clone(),
            summaries: Arc::new(EmptySummaryRepo),
            embedder: Arc::new(MockEmbeddingBackend::new(8)),
            generation: generation.clone(),
            caller: caller.clone(),
            strategy: Arc::new(LlmClassifierAggregator::new(generation)),
        });
        Arc::new(AppState {
            pipeline,
            tweets,
            caller,
            auth_token,
        })
    }

    async fn send(
        router: Router,
        uri: &str,
        body: &str,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            request = request.header(AUTH_HEADER, token);
        }
        let response = router
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn both_tweets_and_ids_is_a_400() {
        let router = build_router(test_state(None));
        let (status, body) = send(router, "/process-tweets", r#"{"tweets": [], "ids": []}"#, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn neither_tweets_nor_ids_is_a_400() {
        let router = build_router(test_state(None));
        let (status, body) = send(router, "/process-tweets", r#"{}"#, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn empty_tweet_batch_succeeds() {
        let router = build_router(test_state(None));
        let (status, body) = send(router, "/process-tweets", r#"{"tweets": []}"#, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn missing_auth_token_is_a_401() {
        let router = build_router(test_state(Some("secret".to_string())));
        let (status, _) = send(router, "/process-tweets", r#"{"tweets": []}"#, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_auth_token_is_a_401() {
        let router = build_router(test_state(Some("secret".to_string())));
        let (status, _) = send(router, "/process-tweets", r#"{"tweets": []}"#, Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_auth_token_passes() {
        let router = build_router(test_state(Some("secret".to_string())));
        let (status, body) = send(router, "/process-tweets", r#"{"tweets": []}"#, Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn unknown_ids_are_a_400() {
        let router = build_router(test_state(None));
        let (status, body) = send(router, "/process-tweets", r#"{"ids": ["missing"]}"#, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn scrape_and_process_runs_the_pipeline() {
        let router = build_router(test_state(None));
        let (status, body) = send(router, "/scrape-and-process", "", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn scrape_and_process_requires_the_token() {
        let router = build_router(test_state(Some("secret".to_string())));
        let (status, _) = send(router, "/scrape-and-process", "", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
