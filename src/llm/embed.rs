use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::llm::Embedder;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from Ollama's `/api/embeddings`.
pub struct OllamaEmbedder {
    http: Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(EMBED_TIMEOUT).build()?,
            url: url.into(),
            model: model.into(),
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let resp: EmbeddingResponse = self
            .http
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .with_context(|| format!("POST {}", self.url))?
            .error_for_status()
            .context("embedding request rejected")?
            .json()
            .context("decoding embedding")?;

        if resp.embedding.is_empty() {
            bail!("model '{}' returned an empty embedding", self.model);
        }
        Ok(resp.embedding)
    }
}
