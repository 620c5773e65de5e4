use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use crate::llm::Completer;

pub const NO_RESPONSE: &str = "No response generated.";
pub const GENERATION_ERROR: &str = "Error generating response.";

const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateChunk {
    response: Option<String>,
    error: Option<String>,
}

pub struct OllamaClient {
    http: Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(GENERATE_TIMEOUT).build()?,
            url: url.into(),
            model: model.into(),
        })
    }

    fn stream(&self, prompt: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
            })
            .send()
            .with_context(|| format!("POST {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            log::warn!("generation endpoint answered {status}");
        }

        accumulate(BufReader::new(resp)).context("reading generation stream")
    }
}

impl Completer for OllamaClient {
    fn complete(&self, prompt: &str) -> String {
        reply(self.stream(prompt))
    }
}

/// Maps a finished or failed stream to the text shown to the user.
fn reply(streamed: Result<String>) -> String {
    match streamed {
        Ok(text) => finish(&text),
        Err(e) => {
            log::warn!("generation failed: {e:#}");
            GENERATION_ERROR.to_string()
        }
    }
}

/// Concatenates the `response` field of every parseable NDJSON line, in order.
/// Lines that are not JSON are skipped; only read errors fail.
pub fn accumulate<R: BufRead>(reader: R) -> io::Result<String> {
    let mut acc = String::new();
    for line in reader.split(b'\n') {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<GenerateChunk>(&line) {
            Ok(chunk) => {
                if let Some(err) = chunk.error {
                    log::warn!("model reported: {err}");
                }
                if let Some(piece) = chunk.response {
                    acc.push_str(&piece);
                }
            }
            Err(e) => log::debug!("skipping malformed fragment: {e}"),
        }
    }
    Ok(acc)
}

/// Trimmed text, or the empty-output sentinel.
pub fn finish(acc: &str) -> String {
    let text = acc.trim();
    if text.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        text.to_string()
    }
}
