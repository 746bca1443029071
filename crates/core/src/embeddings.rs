use crate::error::MatchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MatchError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Deterministic hashed character-trigram embedder for offline runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        Ok(self.embed_sync(text))
    }
}

pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint serving a sentence
/// embedding model. Vectors are L2-normalized so cosine scores stay bounded.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Connects and probes the model once to learn its output dimension.
    pub async fn connect(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, MatchError> {
        let mut embedder = Self {
            client: Client::new(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
            dimensions: 0,
        };

        let probe = embedder.request(&["dimension probe".to_string()]).await?;
        let dimensions = probe.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            return Err(MatchError::unavailable(
                "embedding service",
                format!("{} returned an empty probe vector", embedder.endpoint),
            ));
        }
        embedder.dimensions = dimensions;
        Ok(embedder)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| MatchError::unavailable("embedding service", error))?;
        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                "embedding service",
                format!("{} returned {}", self.endpoint, response.status()),
            ));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| MatchError::unavailable("embedding service", error))?;
        if parsed.data.len() != texts.len() {
            return Err(MatchError::unavailable(
                "embedding service",
                format!("{} vectors for {} inputs", parsed.data.len(), texts.len()),
            ));
        }
        parsed.data.sort_by_key(|entry| entry.index);

        Ok(parsed
            .data
            .into_iter()
            .map(|entry| {
                let mut vector = entry.embedding;
                l2_normalize(&mut vector);
                vector
            })
            .collect())
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<(), MatchError> {
        match vectors.iter().find(|vector| vector.len() != self.dimensions) {
            Some(vector) => Err(MatchError::unavailable(
                "embedding service",
                format!("vector dimension {} != {}", vector.len(), self.dimensions),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MatchError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| MatchError::unavailable("embedding service", "no vector returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request(texts).await?;
        self.check_dimensions(&vectors)?;
        Ok(vectors)
    }
}
