use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::ResponseConfig;
use crate::query::{GenerateError, GenerationRequest, QueryOutcome};
use crate::web::state::AppState;

// Query types

#[derive(Debug, Deserialize, Clone)]
pub struct GenerateQueryRequest {
    pub question: String,
    pub api_key: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DescribeTableParams {
    pub schema: Option<String>,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub catalog_connected: bool,
}

// API Implementations

// Natural language query generation
pub async fn generate_query(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateQueryRequest>,
) -> Response {
    debug!("Generate query request: {}", payload.question);

    let request = GenerationRequest {
        natural_language: payload.question,
        api_key: payload.api_key,
        provider: payload.provider,
    };

    // Run the pipeline in its own task so that a panic anywhere inside it
    // surfaces as a structured failure outcome, not a dropped connection.
    let state = Arc::clone(&app_state);
    let task = tokio::spawn(async move { state.generator.generate(&request).await });

    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            error!("Query generation task failed: {}", join_error);
            QueryOutcome::failure(GenerateError::Internal(join_error.to_string()).to_string())
        }
    };

    render_outcome(&outcome, &app_state.config.response)
}

// Catalog: list user tables
pub async fn list_tables(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(catalog) = &app_state.catalog else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "No database configured for catalog access".to_string(),
        ));
    };

    match catalog.list_tables().await {
        Ok(tables) => Ok(Json(tables)),
        Err(e) => {
            error!("Failed to list tables: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Catalog query failed: {}", e),
            ))
        }
    }
}

// Catalog: describe one table
pub async fn describe_table(
    State(app_state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<DescribeTableParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(catalog) = &app_state.catalog else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "No database configured for catalog access".to_string(),
        ));
    };

    let schema = params.schema.unwrap_or_else(|| "public".to_string());

    match catalog.describe_table(&table, &schema).await {
        Ok(details) if details.columns.is_empty() => Err((
            StatusCode::NOT_FOUND,
            format!("Table '{}.{}' not found", schema, table),
        )),
        Ok(details) => Ok(Json(details)),
        Err(e) => {
            error!("Failed to describe table {}.{}: {}", schema, table, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Catalog query failed: {}", e),
            ))
        }
    }
}

pub async fn system_status(State(app_state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now() - app_state.startup_time;

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds(),
        catalog_connected: app_state.catalog.is_some(),
    })
}

fn render_outcome(outcome: &QueryOutcome, response_config: &ResponseConfig) -> Response {
    if response_config.use_formatted_response && outcome.success {
        return format_text_response(outcome, response_config).into_response();
    }

    Json(shape_response(outcome, response_config)).into_response()
}

/// Shapes the outcome per the `[response]` toggles: suppressed fields are
/// omitted from the payload entirely.
fn shape_response(outcome: &QueryOutcome, config: &ResponseConfig) -> Value {
    let mut body = Map::new();
    body.insert("success".to_string(), json!(outcome.success));
    body.insert(
        "generated_query".to_string(),
        json!(outcome.generated_query),
    );
    if config.show_explanation {
        body.insert("explanation".to_string(), json!(outcome.explanation));
    }
    if config.show_warnings {
        body.insert("warnings".to_string(), json!(outcome.warnings));
    }
    body.insert(
        "row_limit_applied".to_string(),
        json!(outcome.row_limit_applied),
    );
    if config.show_suggested_visualization {
        body.insert(
            "suggested_visualization".to_string(),
            json!(outcome.suggested_visualization),
        );
    }
    body.insert("error_message".to_string(), json!(outcome.error_message));

    Value::Object(body)
}

/// Plain-text rendering used when `use_formatted_response` is on.
fn format_text_response(outcome: &QueryOutcome, config: &ResponseConfig) -> String {
    let mut text = String::new();

    if !outcome.generated_query.is_empty() {
        text.push_str(&outcome.generated_query);
        text.push('\n');
    }
    if config.show_explanation && !outcome.explanation.is_empty() {
        text.push_str("\n-- ");
        text.push_str(&outcome.explanation);
        text.push('\n');
    }
    if config.show_warnings {
        for warning in &outcome.warnings {
            text.push_str("-- warning: ");
            text.push_str(warning);
            text.push('\n');
        }
    }

    text
}
