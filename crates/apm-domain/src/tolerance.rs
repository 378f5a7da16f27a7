//! Approximate equality for continuous parameter values

use serde::{Deserialize, Serialize};

/// Default absolute tolerance
pub const DEFAULT_ATOL: f64 = 1e-8;

/// Default relative tolerance
pub const DEFAULT_RTOL: f64 = 1e-3;

/// `|a - b| <= atol + rtol * |b|`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Absolute tolerance
    pub atol: f64,
    /// Relative tolerance, scaled by the reference value
    pub rtol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            atol: DEFAULT_ATOL,
            rtol: DEFAULT_RTOL,
        }
    }
}

impl Tolerance {
    /// Create tolerance
    #[inline]
    #[must_use]
    pub const fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    /// Check if `value` is close to `reference`
    #[inline]
    #[must_use]
    pub fn is_within(&self, value: f64, reference: f64) -> bool {
        (value - reference).abs() <= self.atol + self.rtol * reference.abs()
    }
}
