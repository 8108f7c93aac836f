use statescope::core::io::traits::TableFileError;
use statescope::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read table '{path}': {source}", path = path.display())]
    TableRead {
        path: PathBuf,
        #[source]
        source: TableFileError,
    },

    #[error("Failed to write '{path}': {source}", path = path.display())]
    TableWrite {
        path: PathBuf,
        #[source]
        source: TableFileError,
    },

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
