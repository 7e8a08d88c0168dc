use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod llm;
mod query;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::catalog::CatalogInspector;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Catalog access is optional context: without it, generation still runs,
    // just without schema grounding.
    let catalog = if config.database.url.is_empty() {
        warn!("No database URL configured; generating without schema context");
        None
    } else {
        match db::connect(&config.database).await {
            Ok(pool) => {
                info!("Connected to database catalog");
                Some(CatalogInspector::new(pool))
            }
            Err(e) => {
                error!("Failed to connect to database: {}", e);
                // Continue anyway, generation degrades gracefully
                None
            }
        }
    };

    let app_state = Arc::new(AppState::new(config.clone(), catalog));

    // Start the web server
    info!(
        "Starting nl-query server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            )) as Box<dyn std::error::Error>);
        }
    }

    Ok(())
}
