pub mod extract;
pub mod prompt;
pub mod resolver;
pub mod safety;

use crate::config::{AppConfig, Provider};
use crate::db::catalog::CatalogInspector;
use crate::llm::{self, ChatModel, GenerationParams, LlmError};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use tracing::{info, warn};

/// One natural-language generation request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub natural_language: String,
    pub api_key: Option<String>,
    pub provider: Option<String>,
}

/// The structured result of one pipeline run. `success == false` always
/// comes with an empty query and a populated error message; `success ==
/// true` with an empty query is the clarification outcome, where the model
/// asked a question through the explanation field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub generated_query: String,
    pub explanation: String,
    pub warnings: Vec<String>,
    pub row_limit_applied: bool,
    pub suggested_visualization: String,
    pub error_message: String,
}

impl QueryOutcome {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            generated_query: String::new(),
            explanation: String::new(),
            warnings: Vec::new(),
            row_limit_applied: false,
            suggested_visualization: String::new(),
            error_message: message,
        }
    }
}

/// Pipeline error taxonomy. Every variant is terminal for the current
/// request; the orchestrator converts each into a failure outcome instead
/// of letting it cross the service boundary.
#[derive(Debug)]
pub enum GenerateError {
    EmptyInput,
    NoCredential(String),
    ClientInit(String),
    Provider(String),
    EmptyResponse,
    UnsafeQuery(String),
    Internal(String),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::EmptyInput => f.write_str("Natural language query cannot be empty"),
            GenerateError::NoCredential(msg) => f.write_str(msg),
            GenerateError::ClientInit(msg) => write!(f, "Failed to create AI client: {}", msg),
            GenerateError::Provider(msg) => write!(f, "AI API error: {}", msg),
            GenerateError::EmptyResponse => f.write_str("Empty response from AI service"),
            GenerateError::UnsafeQuery(msg) => f.write_str(msg),
            GenerateError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl Error for GenerateError {}

type ClientFactory = Box<dyn Fn(Provider, &str) -> Result<Box<dyn ChatModel>, LlmError> + Send + Sync>;

/// The orchestrator: resolve -> gather context -> build prompt -> call the
/// model -> extract -> filter. Holds an immutable configuration snapshot;
/// concurrent calls share no mutable state.
pub struct QueryGenerator {
    config: AppConfig,
    catalog: Option<CatalogInspector>,
    client_factory: ClientFactory,
}

impl QueryGenerator {
    pub fn new(config: AppConfig, catalog: Option<CatalogInspector>) -> Self {
        let general = config.general.clone();
        let factory: ClientFactory =
            Box::new(move |provider, api_key| llm::build_client(provider, api_key, &general));
        Self::with_client_factory(config, catalog, factory)
    }

    /// Injects a client factory; the seam for stubbing the LLM in tests.
    pub fn with_client_factory(
        config: AppConfig,
        catalog: Option<CatalogInspector>,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            config,
            catalog,
            client_factory,
        }
    }

    /// Runs the pipeline. Always returns an outcome; every failure is
    /// folded into `success = false` with a populated error message.
    pub async fn generate(&self, request: &GenerationRequest) -> QueryOutcome {
        match self.run(request).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Query generation failed: {}", error);
                QueryOutcome::failure(error.to_string())
            }
        }
    }

    async fn run(&self, request: &GenerationRequest) -> Result<QueryOutcome, GenerateError> {
        if request.natural_language.is_empty() {
            return Err(GenerateError::EmptyInput);
        }

        let resolved = resolver::resolve(
            &self.config,
            request.provider.as_deref(),
            request.api_key.as_deref(),
        )?;
        info!(
            "Resolved provider {} (credential source: {})",
            resolved.provider, resolved.source
        );

        let schema_context = self.schema_context(&request.natural_language).await;
        let user_prompt = prompt::build_user_prompt(
            &request.natural_language,
            schema_context.as_deref(),
            &self.config.query,
        );

        let client = (self.client_factory)(resolved.provider, &resolved.api_key)
            .map_err(|e| GenerateError::ClientInit(e.to_string()))?;

        let model_name = self
            .config
            .provider_profile(resolved.provider)
            .map(|profile| profile.default_model.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_model(resolved.provider).to_string());

        let params = self
            .config
            .model_profile(&model_name)
            .map(|model| GenerationParams {
                max_tokens: model.max_tokens,
                temperature: model.temperature,
            })
            .unwrap_or_default();

        info!(
            "Using {} provider with model: {} (max_tokens={}, temperature={})",
            resolved.provider, model_name, params.max_tokens, params.temperature
        );

        let text = client
            .generate(&model_name, prompt::SYSTEM_PROMPT, &user_prompt, params)
            .await
            .map_err(|e| GenerateError::Provider(e.to_string()))?;

        if text.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }

        let extracted = extract::extract(&text);

        // Empty SQL with success is the clarification path: the model asked
        // a question via the explanation. The safety filter does not run.
        if extracted.sql.is_empty() {
            return Ok(QueryOutcome {
                success: true,
                generated_query: String::new(),
                explanation: extracted.explanation,
                warnings: extracted.warnings,
                row_limit_applied: extracted.row_limit_applied,
                suggested_visualization: extracted.suggested_visualization,
                error_message: String::new(),
            });
        }

        safety::check(&extracted.sql).map_err(GenerateError::UnsafeQuery)?;

        Ok(QueryOutcome {
            success: true,
            generated_query: extracted.sql,
            explanation: extracted.explanation,
            warnings: extracted.warnings,
            row_limit_applied: extracted.row_limit_applied,
            suggested_visualization: extracted.suggested_visualization,
            error_message: String::new(),
        })
    }

    /// Best-effort schema context. Catalog failures degrade to no context
    /// with a warning; they never fail the request.
    async fn schema_context(&self, natural_language: &str) -> Option<String> {
        let catalog = self.catalog.as_ref()?;

        let tables = match catalog.list_tables().await {
            Ok(tables) => tables,
            Err(error) => {
                warn!("Catalog inspection failed, generating without schema context: {}", error);
                return None;
            }
        };

        let mut details = Vec::new();
        for table in prompt::mentioned_tables(natural_language, &tables) {
            match catalog
                .describe_table(&table.table_name, &table.schema_name)
                .await
            {
                Ok(table_details) => details.push(table_details),
                Err(error) => {
                    warn!(
                        "Failed to describe table {}.{}: {}",
                        table.schema_name, table.table_name, error
                    );
                }
            }
        }

        Some(prompt::render_schema_context(&tables, &details))
    }
}

fn fallback_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => crate::llm::providers::anthropic::FALLBACK_MODEL,
        Provider::OpenAi | Provider::Unknown => crate::llm::providers::openai::FALLBACK_MODEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum StubBehavior {
        Reply(String),
        FailTransport(String),
    }

    struct StubModel {
        behavior: StubBehavior,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl ChatModel for StubModel {
        async fn generate(
            &self,
            model: &str,
            _system_prompt: &str,
            user_prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), user_prompt.to_string()));
            match &self.behavior {
                StubBehavior::Reply(text) => Ok(text.clone()),
                StubBehavior::FailTransport(msg) => {
                    Err(LlmError::ConnectionError(msg.clone()))
                }
            }
        }
    }

    struct Harness {
        generator: QueryGenerator,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    fn harness(config: AppConfig, behavior: StubBehavior) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let factory_calls = Arc::clone(&calls);
        let factory_seen = Arc::clone(&seen);
        let factory: ClientFactory = Box::new(move |_provider, _api_key| {
            Ok(Box::new(StubModel {
                behavior: behavior.clone(),
                calls: Arc::clone(&factory_calls),
                seen: Arc::clone(&factory_seen),
            }) as Box<dyn ChatModel>)
        });
        Harness {
            generator: QueryGenerator::with_client_factory(config, None, factory),
            calls,
            seen,
        }
    }

    fn config_with_openai_key() -> AppConfig {
        let mut config = AppConfig::default();
        config.openai.api_key = "sk-test".to_string();
        config
    }

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            natural_language: text.to_string(),
            api_key: None,
            provider: None,
        }
    }

    #[tokio::test]
    async fn empty_input_fails_without_llm_invocation() {
        let h = harness(config_with_openai_key(), StubBehavior::Reply("{}".into()));
        let outcome = h.generator.generate(&request("")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_message, "Natural language query cannot be empty");
        assert!(outcome.generated_query.is_empty());
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credentials_everywhere_fail_resolution() {
        let h = harness(AppConfig::default(), StubBehavior::Reply("{}".into()));
        let outcome = h.generator.generate(&request("count users")).await;

        assert!(!outcome.success);
        assert!(outcome.error_message.contains("API key required"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn structured_reply_yields_verbatim_sql() {
        let reply = r#"{"sql":"SELECT id, created_at FROM orders ORDER BY created_at DESC LIMIT 5","explanation":"Five most recent orders.","warnings":[],"row_limit_applied":true,"suggested_visualization":"table"}"#;
        let h = harness(config_with_openai_key(), StubBehavior::Reply(reply.into()));
        let outcome = h
            .generator
            .generate(&request("show me the 5 most recent orders"))
            .await;

        assert!(outcome.success);
        assert_eq!(
            outcome.generated_query,
            "SELECT id, created_at FROM orders ORDER BY created_at DESC LIMIT 5"
        );
        assert_eq!(outcome.explanation, "Five most recent orders.");
        assert!(outcome.row_limit_applied);
        assert_eq!(outcome.suggested_visualization, "table");
        assert!(outcome.error_message.is_empty());

        // the configured default model was requested and the prompt carried
        // the literal request text
        let seen = h.seen.lock().unwrap();
        assert_eq!(seen[0].0, "gpt-4o");
        assert!(seen[0].1.contains("Request: show me the 5 most recent orders"));
    }

    #[tokio::test]
    async fn system_table_reference_is_rejected() {
        let h = harness(
            config_with_openai_key(),
            StubBehavior::Reply("SELECT * FROM information_schema.tables".into()),
        );
        let outcome = h.generator.generate(&request("list all tables")).await;

        assert!(!outcome.success);
        assert!(outcome.generated_query.is_empty());
        assert_eq!(
            outcome.error_message,
            "Generated query accesses system tables. Please query user tables only."
        );
    }

    #[tokio::test]
    async fn empty_sql_is_a_clarification_success() {
        let reply = r#"{"sql":"","explanation":"Which column should define recency?"}"#;
        let h = harness(config_with_openai_key(), StubBehavior::Reply(reply.into()));
        let outcome = h.generator.generate(&request("show recent things")).await;

        assert!(outcome.success);
        assert!(outcome.generated_query.is_empty());
        assert_eq!(outcome.explanation, "Which column should define recency?");
        assert!(outcome.error_message.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_provider_error() {
        let h = harness(
            config_with_openai_key(),
            StubBehavior::FailTransport("connection refused".into()),
        );
        let outcome = h.generator.generate(&request("count users")).await;

        assert!(!outcome.success);
        assert!(outcome.error_message.starts_with("AI API error:"));
        assert!(outcome.error_message.contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_model_text_fails_as_empty_response() {
        let h = harness(config_with_openai_key(), StubBehavior::Reply(String::new()));
        let outcome = h.generator.generate(&request("count users")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_message, "Empty response from AI service");
    }

    #[tokio::test]
    async fn client_construction_failure_is_distinct_from_transport() {
        let factory: ClientFactory = Box::new(|_provider, _api_key| {
            Err(LlmError::ConfigError("API key is empty".to_string()))
        });
        let generator =
            QueryGenerator::with_client_factory(config_with_openai_key(), None, factory);
        let outcome = generator.generate(&request("count users")).await;

        assert!(!outcome.success);
        assert!(outcome.error_message.starts_with("Failed to create AI client:"));
    }

    #[tokio::test]
    async fn identical_inputs_produce_identical_outcomes() {
        let reply = r#"{"sql":"SELECT id FROM users LIMIT 1000","explanation":"All users.","row_limit_applied":true}"#;
        let h = harness(config_with_openai_key(), StubBehavior::Reply(reply.into()));

        let first = h.generator.generate(&request("list users")).await;
        let second = h.generator.generate(&request("list users")).await;
        assert_eq!(first, second);
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unregistered_default_model_falls_back_to_adapter_defaults() {
        let mut config = config_with_openai_key();
        config.openai.default_model = "gpt-4o-mini".to_string();
        let h = harness(config, StubBehavior::Reply(r#"{"sql":"SELECT 1"}"#.into()));
        let outcome = h.generator.generate(&request("anything")).await;

        assert!(outcome.success);
        let seen = h.seen.lock().unwrap();
        assert_eq!(seen[0].0, "gpt-4o-mini");
    }
}
