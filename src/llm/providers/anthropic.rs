use crate::config::GeneralConfig;
use crate::llm::{ChatModel, GenerationParams, LlmError, validate_api_key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Model used when the configuration names no default for this provider.
pub const FALLBACK_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Environment variable consulted by the configuration overlay.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    system: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, general: &GeneralConfig) -> Result<Self, LlmError> {
        validate_api_key(api_key)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(general.request_timeout_ms))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url: API_URL.to_string(),
            api_key: api_key.to_string(),
            max_retries: general.max_retries,
        })
    }

    /// Sends the request, re-sending on transport failure only. HTTP error
    /// statuses are not retried.
    async fn send(&self, request: &MessagesRequest) -> Result<reqwest::Response, LlmError> {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            match self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(request)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!("Anthropic request attempt {} failed: {}", attempt + 1, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(LlmError::ConnectionError(last_error))
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: model.to_string(),
            system: system_prompt.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!("Sending request to Anthropic with model: {}", model);

        let response = self.send(&request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };
            return Err(LlmError::ResponseError(format!(
                "Anthropic API responded with status code: {}{}",
                status, error_body
            )));
        }

        let messages_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = messages_response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| {
                LlmError::ResponseError("No text content block in response".to_string())
            })?;

        Ok(content)
    }
}
