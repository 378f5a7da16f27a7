//! Configuration steps document
//!
//! ```json
//! {
//!   "steps": {
//!     "08_batt1.param": {
//!       "forced_parameters": {
//!         "BATT_MONITOR": { "New Value": 4, "Change Reason": "Analog voltage and current" }
//!       },
//!       "derived_parameters": {
//!         "BATT_CAPACITY": {
//!           "New Value": "vehicle_components['Battery']['Specifications']['Capacity mAh']",
//!           "Change Reason": "Total battery capacity"
//!         }
//!       },
//!       "rename_connection": "vehicle_components['Battery Monitor']['FC Connection']['Type']"
//!     }
//!   }
//! }
//! ```
//!
//! Unknown keys (step descriptions, links) are ignored.

use crate::error::{StepError, StepResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A forced or derived parameter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverride {
    /// Expression text, or a literal number/boolean
    #[serde(rename = "New Value")]
    pub new_value: serde_json::Value,
    /// Comment written next to the value
    #[serde(rename = "Change Reason", default)]
    pub change_reason: String,
}

impl ParameterOverride {
    /// Create override from expression text
    #[must_use]
    pub fn new(expression: impl Into<String>, change_reason: impl Into<String>) -> Self {
        Self {
            new_value: serde_json::Value::String(expression.into()),
            change_reason: change_reason.into(),
        }
    }

    /// Expression text; literals are rendered so the evaluator reads them back
    #[must_use]
    pub fn expression(&self) -> String {
        match &self.new_value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(true) => "True".to_string(),
            serde_json::Value::Bool(false) => "False".to_string(),
            serde_json::Value::Null => "None".to_string(),
            other => other.to_string(),
        }
    }
}

/// One configuration step, keyed by its parameter file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationStep {
    /// Values pinned by the step
    #[serde(default)]
    pub forced_parameters: IndexMap<String, ParameterOverride>,
    /// Values computed by the step
    #[serde(default)]
    pub derived_parameters: IndexMap<String, ParameterOverride>,
    /// Expression yielding the connection prefix, e.g. `CAN2` or `SERIAL3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_connection: Option<String>,
}

/// All configuration steps of a vehicle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSteps {
    /// Step per parameter file name, in document order
    #[serde(default)]
    pub steps: IndexMap<String, ConfigurationStep>,
}

impl ConfigurationSteps {
    /// Parse a steps document
    ///
    /// # Errors
    /// Returns [`StepError::Json`] naming `origin`.
    pub fn from_json(text: &str, origin: &str) -> StepResult<Self> {
        serde_json::from_str(text).map_err(|source| StepError::Json {
            origin: origin.to_string(),
            source,
        })
    }

    /// Read and parse a steps document
    ///
    /// # Errors
    /// - [`StepError::Io`] if the file cannot be read
    /// - [`StepError::Json`] if it does not parse
    pub fn from_file(path: &Path) -> StepResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StepError::io_error(path, e))?;
        let steps = Self::from_json(&text, &path.display().to_string())?;
        tracing::debug!("Loaded {} configuration steps from {}", steps.steps.len(), path.display());
        Ok(steps)
    }

    /// Step for a parameter file
    #[inline]
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&ConfigurationStep> {
        self.steps.get(filename)
    }
}
