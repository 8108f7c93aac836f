use thiserror::Error;

use crate::core::density::DensityError;
use crate::core::io::traits::TableFileError;
use crate::core::models::bounds::BoundsError;
use crate::core::models::table::TableError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Density estimation failed: {source}")]
    Density {
        #[from]
        source: DensityError,
    },

    #[error("Table error: {source}")]
    Table {
        #[from]
        source: TableError,
    },

    #[error("Table file error: {source}")]
    TableFile {
        #[from]
        source: TableFileError,
    },

    #[error("No local minima found: {reason}")]
    NoMinimaFound { reason: String },

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Precondition violated: {0}")]
    Precondition(String),
}

impl From<BoundsError> for EngineError {
    fn from(err: BoundsError) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}
