use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ChatModel, ChatPrompt};

/// Connection settings for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Upper bound on one request, connect through last byte
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

/// Async client for `/chat/completions`
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiChatModel {
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        anyhow::ensure!(!settings.api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!settings.model.trim().is_empty(), "missing OpenAI model name");

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", settings.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        let endpoint = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            model: settings.model,
            temperature: settings.temperature,
        })
    }

    fn request_body<'a>(&'a self, prompt: &ChatPrompt<'a>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "assistant",
                    content: prompt.format,
                },
                ChatMessage {
                    role: "user",
                    content: prompt.content,
                },
            ],
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: ChatPrompt<'_>) -> Result<String> {
        let body = self.request_body(&prompt);
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }

        let parsed: ChatResponse = resp.json().await.context("failed to parse OpenAI response")?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .context("OpenAI response contained no message content")?;

        debug!("Received {} bytes from {}", answer.len(), self.model);
        Ok(answer.trim().to_string())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
