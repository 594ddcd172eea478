use crate::error::SearchError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Chunk texts are pushed through the backend in fixed-size batches.
pub const EMBEDDING_BATCH_SIZE: usize = 32;

pub trait Embedder {
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Embeds the whole corpus batch by batch, preserving input order.
pub fn embed_corpus(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, SearchError> {
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
        embeddings.extend(embedder.embed_batch(batch)?);
        tracing::debug!(embedded = embeddings.len(), total = texts.len(), "embedding progress");
    }
    Ok(embeddings)
}

/// Deterministic offline embedder hashing character trigrams into a
/// normalized vector. No external service required.
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

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return Ok(vector);
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

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

/// Blocking client for an OpenAI-style embeddings endpoint. Request timeout
/// policy belongs to the backend configuration, not the retrieval pipeline.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: Option<String>,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        model: Option<String>,
        dimensions: usize,
    ) -> Result<Self, SearchError> {
        Url::parse(endpoint)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let bearer = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&bearer)
                    .map_err(|error| SearchError::Request(format!("invalid api key: {error}")))?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model,
            dimensions,
        })
    }

    /// Reads `EMBEDDING_ENDPOINT`, `EMBEDDING_API_KEY`, `EMBEDDING_MODEL`,
    /// and `EMBEDDING_DIMENSIONS`. Returns `None` when no endpoint is set.
    pub fn from_env() -> Result<Option<Self>, SearchError> {
        let endpoint = match std::env::var("EMBEDDING_ENDPOINT") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => return Ok(None),
        };

        let api_key = std::env::var("EMBEDDING_API_KEY").ok().and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });
        let model = std::env::var("EMBEDDING_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let dimensions = std::env::var("EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS);

        Ok(Some(Self::new(&endpoint, api_key, model, dimensions)?))
    }

    fn request_embeddings(&self, texts: &[String]) -> Result<EmbeddingResponse, SearchError> {
        let request = EmbeddingRequest {
            input: texts,
            model: self.model.as_deref(),
        };
        let response = self.client.post(&self.endpoint).json(&request).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Embedding(format!(
                "embedding endpoint {} returned {status}",
                self.endpoint
            )));
        }

        Ok(response.json()?)
    }
}

impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        self.embed_batch(std::slice::from_ref(&text.to_string()))?
            .pop()
            .ok_or_else(|| SearchError::Embedding("backend returned no vectors".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // The blocking client must not run directly on an async worker thread.
        let parsed = match tokio::runtime::Handle::try_current() {
            Ok(_) => tokio::task::block_in_place(|| self.request_embeddings(texts)),
            Err(_) => self.request_embeddings(texts),
        }?;

        if parsed.data.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "requested {} embeddings but backend returned {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for row in parsed.data {
            if row.embedding.len() != self.dimensions {
                return Err(SearchError::Embedding(format!(
                    "backend produced dimension {} instead of {}",
                    row.embedding.len(),
                    self.dimensions
                )));
            }
            vectors.push(row.embedding);
        }
        Ok(vectors)
    }
}
