//! Error types for configuration step processing

use crate::expr::ExprError;
use std::path::PathBuf;

/// Configuration step error
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Steps document could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Document path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Steps document is not valid JSON or has the wrong shape
    #[error("invalid configuration steps in {origin}: {source}")]
    Json {
        /// Document name
        origin: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// A forced or derived value could not be computed; nothing was committed
    #[error("{message}")]
    Evaluation {
        /// Parameter file of the step
        file: String,
        /// Single human-readable description
        message: String,
    },

    /// Connection rename prefix is not usable
    #[error("invalid connection rename: {0}")]
    Rename(String),

    /// Expression failure outside a forced/derived computation
    #[error(transparent)]
    Expression(#[from] ExprError),
}

impl StepError {
    /// Create I/O error with path context
    #[inline]
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for step processing
pub type StepResult<T> = Result<T, StepError>;
