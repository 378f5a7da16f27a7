//! A single parameter value with its optional change-reason comment

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Parameter value as stored in a parameter file
///
/// Equality is structural: two records are equal when both the value and
/// the comment are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    value: f64,
    comment: Option<String>,
}

impl ParameterRecord {
    /// Create record; an empty or whitespace-only comment is stored as `None`
    #[inline]
    #[must_use]
    pub fn new(value: f64, comment: Option<String>) -> Self {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self { value, comment }
    }

    /// Create record without a comment
    #[inline]
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        Self {
            value,
            comment: None,
        }
    }

    /// Parameter value
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Change-reason comment
    #[inline]
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Value and comment are usable as an override: value is finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

impl Display for ParameterRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.comment {
            Some(comment) => write!(f, "{}  # {comment}", format_value(self.value)),
            None => f.write_str(&format_value(self.value)),
        }
    }
}

/// Render a value with six decimals, then strip trailing zeros and a
/// trailing decimal point (`100.000000` → `100`, `0.250000` → `0.25`)
#[must_use]
pub fn format_value(value: f64) -> String {
    let fixed = format!("{value:.6}");
    if !fixed.contains('.') {
        return fixed;
    }
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}
