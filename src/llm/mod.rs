pub mod providers;

use crate::config::{GeneralConfig, Provider};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Sampling parameters for one generation call. Callers that have no
/// registered profile for the chosen model use the adapter defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Capability interface over a provider's text-generation endpoint.
///
/// The pipeline never sees provider-specific request or response shapes;
/// everything behind this trait is wire plumbing.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LlmError>;
}

/// Constructs the client for the resolved provider. An unknown provider
/// falls back to OpenAI, matching the resolver's first-class default.
pub fn build_client(
    provider: Provider,
    api_key: &str,
    general: &GeneralConfig,
) -> Result<Box<dyn ChatModel>, LlmError> {
    let client: Box<dyn ChatModel> = match provider {
        Provider::OpenAi => {
            info!("Creating OpenAI client");
            Box::new(providers::openai::OpenAiClient::new(api_key, general)?)
        }
        Provider::Anthropic => {
            info!("Creating Anthropic client");
            Box::new(providers::anthropic::AnthropicClient::new(api_key, general)?)
        }
        Provider::Unknown => {
            warn!("Unknown provider, defaulting to OpenAI");
            Box::new(providers::openai::OpenAiClient::new(api_key, general)?)
        }
    };

    Ok(client)
}

/// Rejects credentials that cannot be sent as an HTTP header value. This is
/// a construction-time configuration error, distinct from transport errors.
pub(crate) fn validate_api_key(api_key: &str) -> Result<(), LlmError> {
    if api_key.is_empty() {
        return Err(LlmError::ConfigError("API key is empty".to_string()));
    }
    if api_key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LlmError::ConfigError(
            "API key contains whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_key_passes() {
        assert!(validate_api_key("sk-abc123").is_ok());
    }

    #[test]
    fn empty_key_is_config_error() {
        match validate_api_key("") {
            Err(LlmError::ConfigError(_)) => {}
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn key_with_whitespace_is_config_error() {
        assert!(validate_api_key("sk-abc 123").is_err());
        assert!(validate_api_key("sk-abc\n123").is_err());
    }

    #[test]
    fn build_client_validates_credential() {
        let general = GeneralConfig::default();
        assert!(build_client(Provider::OpenAi, "", &general).is_err());
        assert!(build_client(Provider::Anthropic, "key\n", &general).is_err());
        assert!(build_client(Provider::OpenAi, "sk-ok", &general).is_ok());
        // unknown provider still yields a client (OpenAI fallback)
        assert!(build_client(Provider::Unknown, "sk-ok", &general).is_ok());
    }
}
