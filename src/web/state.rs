use crate::config::AppConfig;
use crate::db::catalog::CatalogInspector;
use crate::query::QueryGenerator;

/// Shared application state for the web server. Everything here is
/// immutable after startup, so concurrent requests need no locking.
pub struct AppState {
    pub config: AppConfig,
    pub generator: QueryGenerator,
    pub catalog: Option<CatalogInspector>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: Option<CatalogInspector>) -> Self {
        let generator = QueryGenerator::new(config.clone(), catalog.clone());

        Self {
            config,
            generator,
            catalog,
            startup_time: chrono::Utc::now(),
        }
    }
}
