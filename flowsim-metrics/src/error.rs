//! Error types for statistics export.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
