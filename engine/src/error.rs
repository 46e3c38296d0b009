use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A persisted structure exists but cannot be read back. Fatal at open time.
    #[error("failed to load {what} from {}: {reason}", path.display())]
    Load {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("{failed} of {total} posting updates failed")]
    PartialWrite { failed: usize, total: usize },

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl EngineError {
    pub(crate) fn load(what: &'static str, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EngineError::Load { what, path: path.into(), reason: reason.to_string() }
    }
}
