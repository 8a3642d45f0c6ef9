use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::LlmConfig;

use super::{Generation, GenerationConfig, LlmClient};

/// Chat-completions client for the Hugging Face router (OpenAI-compatible
/// wire format). The API key is read from the environment at construction.
pub struct HfClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl HfClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow!(
                "LLM API key not found in environment variable {}",
                config.api_key_env
            )
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Creating HfClient"
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        })
    }

    /// Parse a response body as JSON, with a clear error if the server
    /// returned an HTML error page instead.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}). Response: {}",
                endpoint,
                status,
                preview
            ));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }
}

#[async_trait]
impl LlmClient for HfClient {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Generation> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "stream": false
        });

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            prompt_len = prompt.len(),
            "Sending chat completion request"
        );

        let started = Instant::now();
        let send = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| anyhow!("Request to {} timed out after {:?}", self.endpoint, self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request to {} timed out", self.endpoint)
                } else if e.is_connect() {
                    anyhow!("Failed to connect to {}: {}", self.endpoint, e)
                } else {
                    anyhow!("Request to {} failed: {}", self.endpoint, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            tracing::error!(endpoint = %self.endpoint, status = %status, error = %error, "API returned error");
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let result: ChatResponse = Self::parse_json_response(response, &self.endpoint).await?;
        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No choices returned from API"))?;

        let latency = started.elapsed();
        tracing::debug!(
            latency_ms = latency.as_millis() as u64,
            chars = choice.message.content.len(),
            "Chat completion received"
        );

        Ok(Generation {
            text: choice.message.content,
            model: self.model.clone(),
            latency,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}
