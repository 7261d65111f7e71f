use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backoffice(#[from] backoffice_lib::Error),
    #[error("Failed to write output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to initialize logger: {0}")]
    Logger(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}
