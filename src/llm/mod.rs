// Chat completions against Ollama's /api/chat
// Used for landmark extraction and for the final grounded answer


use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::http::HttpClient;
use crate::{Result, WardError};

#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: Url,
    model: String,
    http: HttpClient,
}

/// Sampling options for one completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| WardError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            model: config.llm.model.clone(),
            http: HttpClient::new(&config.http),
        })
    }

    #[inline]
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user prompt and return the trimmed reply
    ///
    /// Errors are returned as plain `anyhow` errors; callers decide which
    /// failure kind a broken completion represents.
    #[inline]
    pub fn complete(&self, prompt: &str, options: ChatOptions) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join("/api/chat")
            .context("Failed to build chat URL")?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: RequestOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Sending chat request to {} (model {}, {} prompt bytes)",
            url,
            self.model,
            prompt.len()
        );

        let response_text = self
            .http
            .post_json(url.as_str(), &request_json)
            .context("Chat request failed")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let content = response.message.content.trim().to_string();
        if content.is_empty() {
            return Err(anyhow!("Model returned an empty reply"));
        }

        Ok(content)
    }
}
