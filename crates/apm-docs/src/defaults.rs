//! Firmware default values

use crate::error::DocResult;
use apm_params::ParameterSet;
use std::path::Path;

/// Default-value file name inside a vehicle directory
pub const DEFAULT_PARAM_FILE: &str = "00_default.param";

/// Load `<dir>/00_default.param`
///
/// A missing file is not an error: it is logged and an empty set returned,
/// so annotations simply carry no `Default:` lines.
///
/// # Errors
/// Propagates read and grammar errors of an existing file.
pub fn load_default_param_file(dir: &Path) -> DocResult<ParameterSet> {
    let path = dir.join(DEFAULT_PARAM_FILE);
    if !path.is_file() {
        tracing::warn!("Default parameter file {} not found", path.display());
        return Ok(ParameterSet::new());
    }
    Ok(ParameterSet::from_file(&path)?)
}
