use crate::config::GeneralConfig;
use crate::llm::{ChatModel, GenerationParams, LlmError, validate_api_key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Model used when the configuration names no default for this provider.
pub const FALLBACK_MODEL: &str = "gpt-4o";

/// Environment variable consulted by the configuration overlay.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
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
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiClient {
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
    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            match self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(request)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!("OpenAI request attempt {} failed: {}", attempt + 1, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(LlmError::ConnectionError(last_error))
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!("Sending request to OpenAI with model: {}", model);

        let response = self.send(&request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };
            return Err(LlmError::ResponseError(format!(
                "OpenAI API responded with status code: {}{}",
                status, error_body
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?;

        Ok(content)
    }
}
