//! Error types for documentation handling
//!
//! Provides error handling for:
//! - Fetch operations (cache → current directory → remote URLs)
//! - XML parsing of the parameter metadata tree
//! - Annotation of parameter files

use apm_params::ParamFileError;
use std::path::PathBuf;

/// Errors from a single documentation source request
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Server answered with something other than 200
    #[error("HTTP status code {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, timeout or body decoding failure
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Documentation errors
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    /// Every URL in the fallback chain failed
    #[error(
        "unable to fetch online XML documentation, last attempted URL: {last_url}; \
         download it manually into {}",
        cache_path.display()
    )]
    FetchExhausted { last_url: String, cache_path: PathBuf },

    /// Malformed XML
    #[error("XML parse error in {origin}: {message}")]
    Xml { origin: String, message: String },

    /// Fetched document could not be saved to the cache directory
    #[error("could not write online XML documentation to {}: {source}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error reading a local file
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Vehicle name outside the supported set
    #[error("vehicle type '{0}' is not supported")]
    UnsupportedVehicle(String),

    /// Sort mode name outside `none`, `missionplanner`, `mavproxy`
    #[error("unsupported sort mode '{0}'")]
    UnsupportedSortMode(String),

    /// Configuration value out of its allowed range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client could not be built (bad proxy URL, TLS backend)
    #[error("http client error: {0}")]
    Client(String),

    /// Parameter file grammar violation
    #[error(transparent)]
    ParamFile(#[from] ParamFileError),
}

impl DocError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create XML error
    pub fn xml(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Xml {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for documentation operations
pub type DocResult<T> = Result<T, DocError>;
