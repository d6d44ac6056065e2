use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbedError, Embedder, normalize};

/// Remote encoder behind an Ollama-compatible `/api/embeddings` endpoint.
///
/// The encoder is an external capability: connection failures propagate to
/// the caller and abort the run rather than being papered over.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, model: &str, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/embeddings", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            dimension: dimension.max(1),
        }
    }
}

impl Embedder for HttpEmbedder {
    fn name(&self) -> &'static str {
        "http"
    }

    fn version(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await?;
        if body.embedding.len() != self.dimension {
            return Err(EmbedError::Dimension {
                expected: self.dimension,
                got: body.embedding.len(),
            });
        }

        debug!(model = %self.model, chars = text.len(), "encoded text");

        let mut vector = body.embedding;
        normalize(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_joined_without_double_slash() {
        let embedder = HttpEmbedder::new("http://localhost:11434/", "nomic-embed-text", 768);
        assert_eq!(embedder.endpoint, "http://localhost:11434/api/embeddings");
    }

    #[test]
    fn model_doubles_as_version() {
        let embedder = HttpEmbedder::new("http://localhost:11434", "nomic-embed-text", 768);
        assert_eq!(embedder.version(), "nomic-embed-text");
        assert_eq!(embedder.dimension(), 768);
    }
}
