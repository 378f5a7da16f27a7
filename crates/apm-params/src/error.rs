//! Error types for parameter file handling
//!
//! Every parse error carries the file it came from, the 1-based line number
//! and the offending text so a single message is enough to locate it.

use std::path::PathBuf;

/// Errors raised while reading, validating or writing parameter files
#[derive(Debug, thiserror::Error)]
pub enum ParamFileError {
    /// Line has a name but no `,`, space or tab after it
    #[error("missing parameter-value separator: '{text}' in {} line {line}", path.display())]
    MissingSeparator {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// Character after the parameter name is not a valid separator
    #[error("invalid parameter name or separator: '{text}' in {} line {line}", path.display())]
    InvalidSeparator {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// Name does not match `^[A-Z][A-Z_0-9]*$`
    #[error("invalid characters in parameter name '{name}' in {} line {line}", path.display())]
    InvalidName {
        path: PathBuf,
        line: usize,
        name: String,
    },

    /// Name longer than [`PARAM_NAME_MAX_LEN`](crate::PARAM_NAME_MAX_LEN)
    #[error("too long parameter name '{name}' in {} line {line}", path.display())]
    NameTooLong {
        path: PathBuf,
        line: usize,
        name: String,
    },

    /// Same name defined twice in one file
    #[error("duplicated parameter '{name}' in {} line {line}", path.display())]
    DuplicateParameter {
        path: PathBuf,
        line: usize,
        name: String,
    },

    /// Value is not a finite number
    #[error("invalid parameter value '{value}' in {} line {line}", path.display())]
    InvalidValue {
        path: PathBuf,
        line: usize,
        value: String,
    },

    /// Unknown write dialect name
    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    /// IO error reading or writing a file
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParamFileError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Line number the error refers to, if any
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MissingSeparator { line, .. }
            | Self::InvalidSeparator { line, .. }
            | Self::InvalidName { line, .. }
            | Self::NameTooLong { line, .. }
            | Self::DuplicateParameter { line, .. }
            | Self::InvalidValue { line, .. } => Some(*line),
            Self::UnsupportedFormat(_) | Self::Io { .. } => None,
        }
    }
}

/// Result type alias for parameter file operations
pub type ParamResult<T> = Result<T, ParamFileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_display_names_file_and_line() {
        let err = ParamFileError::DuplicateParameter {
            path: PathBuf::from("01_first.param"),
            line: 7,
            name: "RC_MAP_ROLL".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "duplicated parameter 'RC_MAP_ROLL' in 01_first.param line 7"
        );
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn unsupported_format_has_no_line() {
        let err = ParamFileError::UnsupportedFormat("qgc".to_string());
        assert_eq!(err.line(), None);
        assert!(err.to_string().contains("qgc"));
    }
}
