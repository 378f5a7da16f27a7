//! Mutation errors for the parameter domain model
//!
//! Two classes of error share one enum:
//! - recoverable signals (`Unchanged`, `OutOfRange`, `DisallowedBits`) that a
//!   caller may confirm or ignore
//! - rejections (`Invalid`, `NotEditable`) that leave the parameter untouched

use std::fmt::{self, Display, Formatter};

/// Why a parameter refuses edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    /// Pinned by a configuration step
    Forced,
    /// Computed by a configuration step
    Derived,
}

impl Display for Lock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forced => "forced",
            Self::Derived => "derived",
        })
    }
}

/// Parameter mutation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// New value equals the current one
    #[error("{name}: value is unchanged")]
    Unchanged {
        /// Parameter name
        name: String,
    },

    /// Value outside the documented bounds
    #[error("{name}: value {value} is outside the range [{}, {}]", bound(.min), bound(.max))]
    OutOfRange {
        /// Parameter name
        name: String,
        /// Rejected value
        value: f64,
        /// Lower bound, if documented
        min: Option<f64>,
        /// Upper bound, if documented
        max: Option<f64>,
    },

    /// Bitmask value with undocumented bits set
    #[error("{name}: value {value} sets undocumented bits {bits:#x}")]
    DisallowedBits {
        /// Parameter name
        name: String,
        /// Rejected value
        value: i64,
        /// Offending bits (all bits for a negative value)
        bits: u64,
    },

    /// Text is not a usable number
    #[error("{name}: invalid value '{text}': {reason}")]
    Invalid {
        /// Parameter name
        name: String,
        /// Rejected input
        text: String,
        /// What is wrong with it
        reason: String,
    },

    /// Forced or derived parameter
    #[error("{name}: the value is {lock} by the configuration step and can not be edited")]
    NotEditable {
        /// Parameter name
        name: String,
        /// Which override holds the value
        lock: Lock,
    },
}

fn bound(value: &Option<f64>) -> String {
    value.map_or_else(|| "-inf/+inf".to_string(), |v| v.to_string())
}

impl ParameterError {
    /// Check if the caller may retry with `ignore_out_of_range`
    #[inline]
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::DisallowedBits { .. })
    }

    /// Check if the value was simply not changed
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged { .. })
    }
}

/// Result type for domain model mutations
pub type DomainResult<T> = Result<T, ParameterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_shows_bounds() {
        let err = ParameterError::OutOfRange {
            name: "PARAM1".to_string(),
            value: 2.5,
            min: Some(0.0),
            max: None,
        };
        assert_eq!(err.to_string(), "PARAM1: value 2.5 is outside the range [0, -inf/+inf]");
        assert!(err.is_out_of_range());
    }

    #[test]
    fn not_editable_names_the_lock() {
        let err = ParameterError::NotEditable {
            name: "BATT_MONITOR".to_string(),
            lock: Lock::Derived,
        };
        assert!(err.to_string().contains("derived"));
        assert!(!err.is_out_of_range());
        assert!(!err.is_unchanged());
    }
}
