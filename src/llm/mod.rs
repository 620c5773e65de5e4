pub mod client;
pub mod embed;
pub mod prompts;

use anyhow::Result;

/// Text generation that never fails; failures come back as sentinel text.
pub trait Completer {
    fn complete(&self, prompt: &str) -> String;
}

/// Text to vector. Must be deterministic for a given model.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
