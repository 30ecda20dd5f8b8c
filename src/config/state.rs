// Application state module
// Everything a request handler reads, built once at startup

use super::types::Config;
use crate::handler::static_files;
use crate::store::{DocumentStore, MongoStore};

/// Application state
pub struct AppState<S: DocumentStore = MongoStore> {
    pub config: Config,
    pub store: S,
    /// Body of the 404 page for non-API paths, read once at startup
    pub error_page: String,
}

impl AppState<MongoStore> {
    /// Create `AppState` backed by the configured `MongoDB` deployment
    pub async fn new(config: &Config) -> Self {
        let store = MongoStore::new(&config.database);
        Self::with_store(config, store).await
    }
}

impl<S: DocumentStore> AppState<S> {
    /// Create `AppState` around an arbitrary store
    pub async fn with_store(config: &Config, store: S) -> Self {
        let error_page = static_files::load_error_page(&config.static_files.error_page).await;
        Self {
            config: config.clone(),
            store,
            error_page,
        }
    }
}
