use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize registry store: {0}")]
    Registry(#[source] anyhow::Error),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[source] anyhow::Error),
}
