use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService};
use crate::llm::CompletionClient;
use crate::rag::SessionCache;
use crate::registry::RegistryStore;

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains references to:
/// - Configuration and paths
/// - The registry database (agents, knowledge bases)
/// - The session cache of built retrieval engines
/// - HTTP clients for the embedding and completion endpoints
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub registry: RegistryStore,
    pub sessions: Arc<SessionCache>,
    pub completions: CompletionClient,
    pub http: reqwest::Client,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Resolving paths and loading configuration
    /// 2. Opening the registry database
    /// 3. Building the shared HTTP client and the session cache
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::load(paths.clone())
            .map_err(|e| InitializationError::Config(e.into()))?;

        let registry = RegistryStore::new(paths.database_file(&config.database_file()))
            .await
            .map_err(|e| InitializationError::Registry(e.into()))?;

        let llm = config.llm_settings();
        // connect_timeout guards dial-up; read_timeout caps the idle gap
        // between stream chunks. Whole-request deadlines are set per call.
        let http = reqwest::Client::builder()
            .connect_timeout(llm.connect_timeout)
            .read_timeout(llm.read_timeout)
            .build()
            .map_err(|e| InitializationError::Http(e.into()))?;

        let sessions = Arc::new(SessionCache::new(config.rag_settings().session_capacity));
        let completions = CompletionClient::new(http.clone());

        Ok(Arc::new(AppState {
            paths,
            config,
            registry,
            sessions,
            completions,
            http,
        }))
    }
}
