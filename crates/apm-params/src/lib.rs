//! APM Parameter Files
//!
//! Flat key/value parameter files as consumed by ArduPilot ground stations.
//!
//! # Core Concepts
//!
//! - [`ParameterRecord`]: one value plus an optional change-reason comment
//! - [`ParameterSet`]: ordered name → record mapping, parsed from a file
//! - [`Dialect`]: Mission Planner (`NAME,VALUE`) or MAVProxy (`NAME VALUE`) output
//!
//! # Example
//!
//! ```rust,no_run
//! use apm_params::{Dialect, ParameterSet};
//!
//! # fn example() -> Result<(), apm_params::ParamFileError> {
//! let set = ParameterSet::from_file("02_imu_temperature_calibration.param")?;
//! set.write("out.param", Dialect::MissionPlanner)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod format;
pub mod name;
pub mod record;
pub mod set;
pub mod write;

pub use error::{ParamFileError, ParamResult};
pub use format::{format_for_write, mavproxy_sort_key, missionplanner_sort_key, Dialect};
pub use name::{
    extract_parameter_name, extract_parameter_name_and_validate, is_valid_name,
    PARAM_NAME_MAX_LEN, PARAM_NAME_REGEX,
};
pub use record::{format_value, ParameterRecord};
pub use set::ParameterSet;
pub use write::{write_atomically, write_lines};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
