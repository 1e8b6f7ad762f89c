//! OpenAI-based embedding client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{clean_input, EmbeddingProvider, QueryEmbedding};
use crate::error::ProviderError;

/// Embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    expected_dimensions: Option<usize>,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    ///
    /// `dimensions` is forwarded to the API when set and also becomes the
    /// expected vector length; otherwise the model's published size is used
    /// when it is known.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        max_retries: usize,
        batch_size: usize,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Input("missing OpenAI API key".into()));
        }
        if model.trim().is_empty() {
            return Err(ProviderError::Input("missing OpenAI model name".into()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ProviderError::Input("invalid OpenAI API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        let expected_dimensions = dimensions.or_else(|| published_dimensions(&model));
        Ok(Self {
            client,
            endpoint,
            model,
            dimensions,
            expected_dimensions,
            max_retries: max_retries.max(1),
            batch_size: batch_size.max(1),
        })
    }

    /// Vector length every response is checked against, when known.
    pub fn expected_dimensions(&self) -> Option<usize> {
        self.expected_dimensions
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
            encoding_format: "float",
        };
        let resp = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let mut parsed: EmbeddingResponse = resp.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(ProviderError::Empty("embedding for every input"));
        }
        let vectors: Vec<Vec<f32>> = parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect();
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), ProviderError> {
        if vector.is_empty() {
            return Err(ProviderError::Empty("embedding values"));
        }
        match self.expected_dimensions {
            Some(expected) if expected != vector.len() => Err(ProviderError::Dimensions {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    async fn request_with_retry(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut attempt = 0usize;
        loop {
            match self.request(inputs).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_transient() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    let backoff = retry_backoff(attempt);
                    warn!(%err, attempt, ?backoff, "retrying embedding batch");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<QueryEmbedding, ProviderError> {
        let cleaned = clean_input(text);
        if cleaned.is_empty() {
            return Err(ProviderError::Input("cannot embed empty text".into()));
        }
        let mut vectors = self.request(&[cleaned.as_str()]).await?;
        let vector = vectors
            .pop()
            .ok_or(ProviderError::Empty("embedding"))?;
        debug!(model = %self.model, dims = vector.len(), "embedded query");
        Ok(QueryEmbedding {
            vector,
            model: self.model.clone(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let cleaned: Vec<String> = texts.iter().map(|text| clean_input(text)).collect();
        if cleaned.iter().any(|text| text.is_empty()) {
            return Err(ProviderError::Input("cannot embed empty text".into()));
        }
        let mut out = Vec::with_capacity(cleaned.len());
        for chunk in cleaned.chunks(self.batch_size) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            out.extend(self.request_with_retry(&refs).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

/// Output sizes of the OpenAI embedding models that do not take a `dimensions` override.
fn published_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
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
