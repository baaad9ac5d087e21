// src/core/ai_client.rs
//! OpenAI-compatible chat completions client, single answer or streamed deltas

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;

use crate::app_log;
use crate::config::ServiceConfig;
use crate::reading::sse::{UpstreamChunk, UpstreamDecoder};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Clone)]
pub struct AiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(
            config.ai_base_url.clone(),
            config.ai_api_key.clone(),
            config.ai_model.clone(),
            config.timeout_seconds,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
            stream,
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, COMPLETIONS_PATH))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to AI service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            app_log!(error, "AI service error {}: {}", status, error_text);
            anyhow::bail!("AI service returned error {}: {}", status, error_text);
        }

        Ok(response)
    }

    /// One-shot completion; returns the trimmed message content.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        app_log!(debug, "Requesting completion from {}", self.model);
        let response = self.send(messages, temperature, max_tokens, false).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse AI service response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            anyhow::bail!("No content generated from AI model");
        }
        Ok(content)
    }

    /// Convenience for a single user prompt.
    pub async fn complete_prompt(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)], temperature, None)
            .await
    }

    /// Start a streamed completion.
    pub async fn stream(&self, messages: &[ChatMessage], temperature: f32) -> Result<DeltaStream> {
        app_log!(debug, "Opening completion stream from {}", self.model);
        let response = self.send(messages, temperature, None, true).await?;
        Ok(DeltaStream {
            inner: Box::pin(response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()))),
            decoder: UpstreamDecoder::new(),
            queue: VecDeque::new(),
            ended: false,
        })
    }
}

/// Content deltas of a streamed completion.
pub struct DeltaStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>,
    decoder: UpstreamDecoder,
    queue: VecDeque<String>,
    ended: bool,
}

impl DeltaStream {
    /// Next non-empty delta; `None` once the upstream sent `[DONE]` or closed.
    pub async fn next_delta(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(delta) = self.queue.pop_front() {
                return Some(Ok(delta));
            }
            if self.ended {
                return None;
            }

            match self.inner.next().await {
                Some(Ok(bytes)) => {
                    for chunk in self.decoder.feed(&bytes) {
                        match chunk {
                            UpstreamChunk::Delta(text) => self.queue.push_back(text),
                            UpstreamChunk::Done => self.ended = true,
                        }
                    }
                }
                Some(Err(e)) => {
                    self.ended = true;
                    return Some(Err(anyhow::Error::new(e).context("AI stream interrupted")));
                }
                None => self.ended = true,
            }
        }
    }
}
