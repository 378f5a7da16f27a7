//! APM Configuration Steps
//!
//! Evaluates the forced and derived parameter values of a configuration
//! step, renames connection-prefixed parameters and builds the per-parameter
//! view of the step's file.
//!
//! ```text
//! configuration_steps_<vehicle>.json ─→ ConfigurationSteps
//!                                              │
//! vehicle_components + fc_parameters ─→ Variables
//!                                              ↓
//!                            ConfigurationStepProcessor::process_step
//!                                              ↓
//!                                         StepOutcome
//! ```
//!
//! Expressions run in a closed evaluator: only the variables handed in and
//! a fixed set of pure functions are reachable.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod expr;
pub mod processor;
pub mod renamer;
pub mod steps;

pub use error::{StepError, StepResult};
pub use expr::{evaluate, ExprError, ExprResult, Expression, Value, Variables, FUNCTIONS};
pub use processor::{
    apply_edits, ConfigurationStepProcessor, Feedback, Overrides, StepOutcome, FC_PARAMETERS,
};
pub use renamer::{ConnectionRenamer, RenameOutcome};
pub use steps::{ConfigurationStep, ConfigurationSteps, ParameterOverride};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{StepError, StepResult};
    pub use crate::expr::{Value, Variables};
    pub use crate::processor::{ConfigurationStepProcessor, StepOutcome};
    pub use crate::steps::{ConfigurationStep, ConfigurationSteps};
}
