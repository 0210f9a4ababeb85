use crate::config::LlmConfig;
use crate::errors::{AppError, ScoringError};
use crate::models::ScoreResult;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Anything that can turn a scoring prompt into a [`ScoreResult`].
///
/// One call per prospect, no retry. The orchestrator is generic over this so
/// it can run against the real model server or a stub.
#[async_trait]
pub trait LeadScorer: Send + Sync {
    async fn score(&self, prompt: &str) -> Result<ScoreResult, ScoringError>;
}

/// Client for an Ollama-compatible `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    options: ChatOptions,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
    seed: u64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    /// Creates a new `OllamaClient` with the configured request timeout.
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create LLM client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            format: "json",
            options: ChatOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.num_predict,
                seed: self.config.seed,
            },
            stream: false,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ScoringError {
        if err.is_timeout() {
            ScoringError::Timeout(self.config.timeout)
        } else {
            ScoringError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl LeadScorer for OllamaClient {
    async fn score(&self, prompt: &str) -> Result<ScoreResult, ScoringError> {
        let url = self.chat_url();
        tracing::debug!("POST {} (model {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ScoringError::Status {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let raw = response.text().await.map_err(|e| self.transport_error(e))?;
        let envelope: ChatResponse = serde_json::from_str(&raw).map_err(|e| {
            ScoringError::Parse(format!("unexpected chat response envelope: {}", e))
        })?;

        parse_score_payload(&envelope.message.content)
    }
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("code fence pattern is valid")
});

/// Parses the model's `message.content` into a [`ScoreResult`].
///
/// A payload wrapped in a Markdown code fence is unwrapped first. Both keys
/// are required; the score is not range-checked.
pub fn parse_score_payload(content: &str) -> Result<ScoreResult, ScoringError> {
    let payload = match CODE_FENCE.captures(content) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => content.trim(),
    };

    if payload.is_empty() {
        return Err(ScoringError::Parse("model returned empty content".to_string()));
    }

    serde_json::from_str(payload)
        .map_err(|e| ScoringError::Parse(format!("invalid score payload: {}", e)))
}
