use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Result, bail};
use log::{debug, warn};
use thiserror::Error;

use crate::Summary;

/// Transcript characters sent to the model; anything past this is dropped
pub const MAX_TRANSCRIPT_CHARS: usize = 12_000;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub const DEFAULT_MAX_TOKENS: u32 = 1500;

const SYSTEM_PROMPT: &str = r#"You summarize YouTube videos from their English transcripts.

Reply with a single JSON object and nothing else, using exactly these fields:
{
  "tldr": "two or three sentences covering the whole video",
  "key_points": ["five short points"],
  "detailed_summary": "three to five paragraphs covering the full content",
  "takeaways": ["three practical takeaways"],
  "topics": ["three tags of one or two words each"]
}

Write plain, factual English. Do not open with phrases like "In this video".
Do not wrap the JSON in markdown."#;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("AI returned unexpected format. Please try again.")]
    Format,

    #[error("AI error: {0}")]
    Provider(String),
}

/// A text completion backend
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String>;
}

/// Pick the completion backend for a model name
pub fn provider_for_model(client: reqwest::Client, model: &str) -> Arc<dyn Completion> {
    if is_anthropic_model(model) {
        Arc::new(Anthropic::from_env(client, model))
    } else {
        Arc::new(OpenAi::from_env(client, model))
    }
}

fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

/// Turns transcript text into a [`Summary`]
pub struct Summarizer {
    provider: Arc<dyn Completion>,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Completion>, max_tokens: u32) -> Self {
        Self { provider, max_tokens }
    }

    pub async fn summarize(&self, transcript: &str) -> Result<Summary, SummarizeError> {
        let trimmed = truncate_chars(transcript, MAX_TRANSCRIPT_CHARS);
        if trimmed.len() < transcript.len() {
            debug!("Transcript truncated from {} to {} bytes", transcript.len(), trimmed.len());
        }

        let user_message = format!("Summarize this YouTube video transcript:\n\n{trimmed}");

        let raw = self
            .provider
            .complete(SYSTEM_PROMPT, &user_message, self.max_tokens)
            .await
            .map_err(|e| SummarizeError::Provider(e.to_string()))?;

        parse_summary(&raw)
    }
}

/// Longest prefix of `text` holding at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest.trim_start();
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

fn parse_summary(raw: &str) -> Result<Summary, SummarizeError> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        warn!("Model reply was not a valid summary: {e}");
        SummarizeError::Format
    })
}

/// Anthropic Messages API
pub struct Anthropic {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl Anthropic {
    pub fn from_env(client: reqwest::Client, model: &str) -> Self {
        Self {
            client,
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Completion for Anthropic {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            eyre::eyre!("ANTHROPIC_API_KEY environment variable not set (required for Claude summarization)")
        })?;

        debug!("Summarizing via Anthropic API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [
                {
                    "role": "user",
                    "content": user
                }
            ]
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Anthropic API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_anthropic_text(&json)
    }
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

/// OpenAI Chat Completions API
pub struct OpenAi {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenAi {
    pub fn from_env(client: reqwest::Client, model: &str) -> Self {
        Self {
            client,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Completion for OpenAi {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            eyre::eyre!("OPENAI_API_KEY environment variable not set (required for OpenAI summarization)")
        })?;

        debug!("Summarizing via OpenAI API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_completion_tokens": max_tokens,
            "messages": [
                {
                    "role": "system",
                    "content": system
                },
                {
                    "role": "user",
                    "content": user
                }
            ]
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_openai_text(&json)
    }
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected OpenAI API response format");
}
