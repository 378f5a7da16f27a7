//! APM Parameter Domain Model
//!
//! Per-parameter view used by a configuration step:
//! - documented constraints (bounds, choices, bitmask bits, read-only)
//! - forced and derived overrides that lock a value
//! - validated mutation with recoverable out-of-range/unchanged signals
//! - tolerance-aware comparisons against default and flight controller values

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bitmask;
pub mod error;
pub mod parameter;
pub mod tolerance;

pub use bitmask::{parse_int_auto_radix, BitLabels, BitmaskHelper};
pub use error::{DomainResult, Lock, ParameterError};
pub use parameter::{ArduPilotParameter, MULTIPLE_CHOICE_EXCLUDED};
pub use tolerance::{Tolerance, DEFAULT_ATOL, DEFAULT_RTOL};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
