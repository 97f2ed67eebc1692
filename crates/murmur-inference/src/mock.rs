//! Mock inference backends for deterministic testing.
//!
//! `MockGenerationBackend` answers prompts from a queue or from
//! substring-matched mappings, and logs every call for assertion.
//! `MockEmbeddingBackend` produces deterministic embeddings derived
//! from the input text, so similar texts map to identical vectors
//! across runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use murmur_core::{EmbeddingBackend, Error, GenerationBackend, Result};

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

/// Mock generation backend.
///
/// Response resolution order: queued responses first, then the first
/// mapping whose pattern occurs in the prompt, then the default.
#[derive(Clone)]
pub struct MockGenerationBackend {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    queue: VecDeque<String>,
    mappings: Vec<(String, String)>,
    default_response: String,
    fail: bool,
    calls: Vec<MockCall>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                queue: VecDeque::new(),
                mappings: Vec::new(),
                default_response: "Mock response".to_string(),
                fail: false,
                calls: Vec::new(),
            })),
        }
    }

    /// Shorthand for a backend that always returns `response`.
    pub fn with_response(response: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().default_response = response.into();
        backend
    }

    /// Set the fallback response.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        self.state.lock().unwrap().default_response = response.into();
        self
    }

    /// Map prompts containing `pattern` to `response`.
    pub fn with_response_mapping(
        self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .mappings
            .push((pattern.into(), response.into()));
        self
    }

    /// Queue a response to be consumed by the next call.
    pub fn push_response(&self, response: impl Into<String>) {
        self.state.lock().unwrap().queue.push_back(response.into());
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn respond(&self, operation: &str, prompt: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall {
            operation: operation.to_string(),
            input: prompt.to_string(),
        });
        if state.fail {
            return Err(Error::Inference("Simulated failure".to_string()));
        }
        if let Some(queued) = state.queue.pop_front() {
            return Ok(queued);
        }
        for (pattern, response) in &state.mappings {
            if prompt.contains(pattern.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(state.default_response.clone())
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond("generate", prompt)
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.respond("generate_with_system", prompt)
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

/// Mock embedding backend producing deterministic unit vectors.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail: Arc<Mutex<bool>>,
}

impl MockEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Deterministic embedding from character codes, normalized.
    pub fn embedding_for(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
        vec
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if *self.fail.lock().unwrap() {
            return Err(Error::Embedding("Simulated failure".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| Self::embedding_for(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}
