use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::llm::providers::{anthropic, openai};

/// An LLM vendor we know how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Unknown,
}

impl Provider {
    /// Parses a provider preference string. Anything that is not a known
    /// provider name maps to `Unknown`, which callers treat as "auto".
    pub fn parse(value: &str) -> Provider {
        match value.to_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "anthropic" => Provider::Anthropic,
            _ => Provider::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named model configuration: identifier plus generation parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl ModelProfile {
    fn new(name: &str, description: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            max_tokens,
            temperature,
        }
    }
}

/// Per-provider configuration: credential, default model, model catalog.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProviderProfile {
    pub api_key: String,
    pub default_model: String,
    pub models: Vec<ModelProfile>,
}

impl ProviderProfile {
    fn openai_defaults() -> Self {
        Self {
            api_key: String::new(),
            default_model: openai::FALLBACK_MODEL.to_string(),
            models: vec![
                ModelProfile::new("gpt-4o", "GPT-4 Omni - Latest model", 16384, 0.7),
                ModelProfile::new("gpt-4", "GPT-4 - High quality model", 8192, 0.7),
                ModelProfile::new("gpt-3.5-turbo", "GPT-3.5 Turbo - Fast and efficient", 4096, 0.7),
            ],
        }
    }

    fn anthropic_defaults() -> Self {
        Self {
            api_key: String::new(),
            default_model: anthropic::FALLBACK_MODEL.to_string(),
            models: vec![ModelProfile::new(
                "claude-3-5-sonnet-20241022",
                "Claude 3.5 Sonnet - Latest model",
                8192,
                0.7,
            )],
        }
    }

    /// A profile loaded from a partial config section loses the built-in
    /// catalog during deserialization; refill the gaps.
    fn ensure_catalog(&mut self, provider: Provider) {
        let builtin = match provider {
            Provider::OpenAi => Self::openai_defaults(),
            Provider::Anthropic => Self::anthropic_defaults(),
            Provider::Unknown => return,
        };
        if self.models.is_empty() {
            self.models = builtin.models;
        }
        if self.default_model.is_empty() {
            self.default_model = builtin.default_model;
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    pub request_timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub enforce_limit: bool,
    pub default_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            enforce_limit: true,
            default_limit: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResponseConfig {
    pub show_explanation: bool,
    pub show_warnings: bool,
    pub show_suggested_visualization: bool,
    pub use_formatted_response: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            show_explanation: true,
            show_warnings: true,
            show_suggested_visualization: false,
            use_formatted_response: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. Empty means no catalog access; query
    /// generation then runs without schema context.
    pub url: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub query: QueryConfig,
    pub response: ResponseConfig,
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub openai: ProviderProfile,
    pub anthropic: ProviderProfile,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            query: QueryConfig::default(),
            response: ResponseConfig::default(),
            database: DatabaseConfig::default(),
            web: WebConfig::default(),
            openai: ProviderProfile::openai_defaults(),
            anthropic: ProviderProfile::anthropic_defaults(),
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Postgres connection string for catalog access
    #[arg(long)]
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let mut default_locations = vec![
                "nl-query.toml".to_string(),
                "config/nl-query.toml".to_string(),
                "/etc/nl-query/config.toml".to_string(),
            ];
            if let Ok(home) = std::env::var("HOME") {
                default_locations.push(format!("{}/.nl-query.toml", home));
            }

            for location in default_locations {
                if Path::new(&location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(&location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        config.openai.ensure_catalog(Provider::OpenAi);
        config.anthropic.ensure_catalog(Provider::Anthropic);

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database_url) = &args.database_url {
            config.database.url = database_url.clone();
        }

        // Environment credentials win over file-sourced ones
        config.apply_env_overlay();

        Ok(config)
    }

    /// Overlays provider credentials from the process environment.
    pub fn apply_env_overlay(&mut self) {
        let openai_key = std::env::var(openai::API_KEY_ENV).ok();
        let anthropic_key = std::env::var(anthropic::API_KEY_ENV).ok();
        self.overlay_credentials(openai_key, anthropic_key);
    }

    fn overlay_credentials(&mut self, openai_key: Option<String>, anthropic_key: Option<String>) {
        if let Some(key) = openai_key {
            self.openai.api_key = key;
            info!("Using OpenAI API key from environment variable");
        }
        if let Some(key) = anthropic_key {
            self.anthropic.api_key = key;
            info!("Using Anthropic API key from environment variable");
        }
    }

    pub fn provider_profile(&self, provider: Provider) -> Option<&ProviderProfile> {
        match provider {
            Provider::OpenAi => Some(&self.openai),
            Provider::Anthropic => Some(&self.anthropic),
            Provider::Unknown => None,
        }
    }

    /// Looks up a model profile by name across all known providers.
    pub fn model_profile(&self, model_name: &str) -> Option<&ModelProfile> {
        self.openai
            .models
            .iter()
            .chain(self.anthropic.models.iter())
            .find(|model| model.name == model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_carry_builtin_model_catalogs() {
        let config = AppConfig::default();
        assert_eq!(config.openai.default_model, "gpt-4o");
        assert_eq!(config.openai.models.len(), 3);
        assert_eq!(config.anthropic.default_model, "claude-3-5-sonnet-20241022");
        assert!(config.openai.api_key.is_empty());
        assert_eq!(config.query.default_limit, 1000);
        assert!(config.query.enforce_limit);
        assert_eq!(config.general.max_retries, 3);
    }

    #[test]
    fn model_profile_lookup_spans_providers() {
        let config = AppConfig::default();
        let gpt4 = config.model_profile("gpt-4").unwrap();
        assert_eq!(gpt4.max_tokens, 8192);
        let claude = config.model_profile("claude-3-5-sonnet-20241022").unwrap();
        assert_eq!(claude.max_tokens, 8192);
        assert!(config.model_profile("no-such-model").is_none());
    }

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("openai"), Provider::OpenAi);
        assert_eq!(Provider::parse("OpenAI"), Provider::OpenAi);
        assert_eq!(Provider::parse("ANTHROPIC"), Provider::Anthropic);
        assert_eq!(Provider::parse("auto"), Provider::Unknown);
        assert_eq!(Provider::parse(""), Provider::Unknown);
    }

    #[test]
    fn config_file_overrides_keep_builtin_catalog() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[general]
max_retries = 1

[query]
enforce_limit = false

[openai]
api_key = "sk-from-file"
default_model = "gpt-4"

[anthropic]
api_key = "ant-from-file"
"#
        )
        .unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            ..CliArgs::default()
        };
        let config = AppConfig::new(&args).unwrap();

        assert_eq!(config.general.max_retries, 1);
        assert!(!config.query.enforce_limit);
        // untouched sections keep their defaults
        assert_eq!(config.general.request_timeout_ms, 30_000);
        assert_eq!(config.openai.default_model, "gpt-4");
        // the built-in model catalog survives a partial provider section
        assert_eq!(config.openai.models.len(), 3);
        assert_eq!(config.anthropic.models.len(), 1);
        // new() applies the env overlay, so only assert file credentials
        // when the variables are absent from the test environment
        if std::env::var(openai::API_KEY_ENV).is_err() {
            assert_eq!(config.openai.api_key, "sk-from-file");
        }
        if std::env::var(anthropic::API_KEY_ENV).is_err() {
            assert_eq!(config.anthropic.api_key, "ant-from-file");
        }
    }

    #[test]
    fn env_overlay_wins_over_file_credentials() {
        let mut config = AppConfig::default();
        config.openai.api_key = "sk-from-file".to_string();
        config.overlay_credentials(Some("sk-from-env".to_string()), None);
        assert_eq!(config.openai.api_key, "sk-from-env");
        // absent env var leaves the configured credential alone
        assert!(config.anthropic.api_key.is_empty());
    }

    #[test]
    fn cli_args_override_file_values() {
        let args = CliArgs {
            host: Some("0.0.0.0".to_string()),
            port: Some(8080),
            database_url: Some("postgres://localhost/app".to_string()),
            ..CliArgs::default()
        };
        let config = AppConfig::new(&args).unwrap();
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.database.url, "postgres://localhost/app");
    }
}
