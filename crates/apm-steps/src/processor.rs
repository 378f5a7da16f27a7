//! Configuration step processor
//!
//! Turns one parameter file plus its configuration step into the parameters
//! a user reviews:
//!
//! ```text
//! forced + derived expressions ─→ values (all or nothing)
//!              ↓
//! rename connection ─→ merge missing overrides ─→ ArduPilotParameter per entry
//! ```
//!
//! The processor owns the documentation index, the default values and the
//! flight controller values it reads; nothing is shared globally.

use crate::error::{StepError, StepResult};
use crate::expr::{Expression, Value, Variables};
use crate::renamer::ConnectionRenamer;
use crate::steps::{ConfigurationStep, ParameterOverride};
use apm_docs::DocumentationIndex;
use apm_domain::{ArduPilotParameter, BitmaskHelper, Tolerance};
use apm_params::{ParameterRecord, ParameterSet};
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// Variable holding the flight controller values
pub const FC_PARAMETERS: &str = "fc_parameters";

const FC_REQUIRED: &str =
    "it requires flight controller parameters, is the flight controller connected?";

/// Overrides computed for one step, name → record
pub type Overrides = IndexMap<String, ParameterRecord>;

/// `(title, message)` for the user interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    /// Short title
    pub title: String,
    /// Full message
    pub message: String,
}

impl Feedback {
    fn new(title: &str, message: String) -> Self {
        Self {
            title: title.to_string(),
            message,
        }
    }
}

/// Everything produced by [`ConfigurationStepProcessor::process_step`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// One parameter per entry of the (renamed, merged) file
    pub parameters: IndexMap<String, ArduPilotParameter>,
    /// Messages for the user
    pub feedback: Vec<Feedback>,
    /// `(old, new)` connection renames
    pub renamed: Vec<(String, String)>,
    /// Entries dropped by colliding renames
    pub duplicates: IndexSet<String>,
    /// Names added to the file from forced or derived values
    pub added: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideKind {
    Forced,
    Derived,
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forced => "forced",
            Self::Derived => "derived",
        })
    }
}

/// Configuration step processor
#[derive(Debug, Clone, Default)]
pub struct ConfigurationStepProcessor {
    doc_index: DocumentationIndex,
    defaults: ParameterSet,
    fc_parameters: IndexMap<String, f64>,
    tolerance: Tolerance,
}

impl ConfigurationStepProcessor {
    /// Create processor over documentation and default values
    #[must_use]
    pub fn new(doc_index: DocumentationIndex, defaults: ParameterSet) -> Self {
        Self {
            doc_index,
            defaults,
            fc_parameters: IndexMap::new(),
            tolerance: Tolerance::default(),
        }
    }

    /// With values read from a connected flight controller
    #[must_use]
    pub fn with_fc_parameters(mut self, fc_parameters: IndexMap<String, f64>) -> Self {
        self.fc_parameters = fc_parameters;
        self
    }

    /// With comparison tolerance for the built parameters
    #[inline]
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Documentation index
    #[inline]
    #[must_use]
    pub fn doc_index(&self) -> &DocumentationIndex {
        &self.doc_index
    }

    /// Flight controller values
    #[inline]
    #[must_use]
    pub fn fc_parameters(&self) -> &IndexMap<String, f64> {
        &self.fc_parameters
    }

    /// Caller variables plus `fc_parameters`
    #[must_use]
    pub fn variables(&self, extra: &Variables) -> Variables {
        let fc: IndexMap<String, Value> = self
            .fc_parameters
            .iter()
            .map(|(name, value)| (name.clone(), Value::Float(*value)))
            .collect();
        extra.clone().with(FC_PARAMETERS, Value::Dict(fc))
    }

    /// Evaluate the forced values of `step`
    ///
    /// # Errors
    /// Returns [`StepError::Evaluation`] on the first failing expression;
    /// no value is returned in that case.
    pub fn compute_forced_values(
        &self,
        filename: &str,
        step: &ConfigurationStep,
        variables: &Variables,
    ) -> StepResult<Overrides> {
        self.compute_overrides(filename, OverrideKind::Forced, &step.forced_parameters, variables)
    }

    /// Evaluate the derived values of `step`
    ///
    /// # Errors
    /// Returns [`StepError::Evaluation`] on the first failing expression;
    /// no value is returned in that case.
    pub fn compute_derived_values(
        &self,
        filename: &str,
        step: &ConfigurationStep,
        variables: &Variables,
    ) -> StepResult<Overrides> {
        self.compute_overrides(filename, OverrideKind::Derived, &step.derived_parameters, variables)
    }

    fn compute_overrides(
        &self,
        filename: &str,
        kind: OverrideKind,
        definitions: &IndexMap<String, ParameterOverride>,
        variables: &Variables,
    ) -> StepResult<Overrides> {
        let mut values = Overrides::new();
        for (name, definition) in definitions {
            let failure = |reason: String| StepError::Evaluation {
                file: filename.to_string(),
                message: format!(
                    "In file '{filename}': '{name}' {kind} parameter could not be computed: {reason}"
                ),
            };

            let text = definition.expression();
            let expression = Expression::parse(&text).map_err(|e| failure(e.to_string()))?;
            if expression.references(FC_PARAMETERS) && self.fc_parameters.is_empty() {
                return Err(failure(FC_REQUIRED.to_string()));
            }
            let result = expression.evaluate(variables).map_err(|e| failure(e.to_string()))?;
            let value = self.to_parameter_value(name, &result).map_err(failure)?;
            if !value.is_finite() {
                tracing::warn!("In file '{filename}': '{name}' {kind} value {value} is ignored");
            }
            values.insert(
                name.clone(),
                ParameterRecord::new(value, Some(definition.change_reason.clone())),
            );
        }
        Ok(values)
    }

    /// Numeric value of an expression result
    ///
    /// Strings are looked up among the parameter's documented choice labels,
    /// then among its bitmask labels (yielding `2^bit`).
    fn to_parameter_value(&self, name: &str, result: &Value) -> Result<f64, String> {
        if let Some(number) = result.as_f64() {
            return Ok(number);
        }
        let Value::Str(label) = result else {
            return Err(format!("result '{result}' of type {} is not a number", result.type_name()));
        };
        let entry = self
            .doc_index
            .get(name)
            .ok_or_else(|| format!("'{label}' can not be converted: '{name}' is not documented"))?;
        if let Some(code) = entry.choices.iter().find(|(_, l)| *l == label).map(|(c, _)| c) {
            return code
                .parse()
                .map_err(|_| format!("documented code '{code}' for '{label}' is not a number"));
        }
        if let Some(field) = entry.field("Bitmask") {
            if let Some(bit) = BitmaskHelper::parse_field(field)
                .into_iter()
                .find(|(_, l)| l == label)
                .map(|(bit, _)| bit)
            {
                return Ok(2f64.powi(i32::try_from(bit).unwrap_or(i32::MAX)));
            }
        }
        Err(format!("'{label}' is not a documented value of '{name}'"))
    }

    /// Add override entries missing from `file_params`
    ///
    /// Only finite values for names the flight controller knows are added;
    /// entries already in the file are never replaced. Returns the added names.
    pub fn merge_overrides(
        &self,
        file_params: &mut ParameterSet,
        overrides: &Overrides,
    ) -> Vec<String> {
        let mut added = Vec::new();
        for (name, record) in overrides {
            if !record.is_finite()
                || file_params.contains(name)
                || !self.fc_parameters.contains_key(name)
            {
                continue;
            }
            file_params.insert(name.clone(), record.clone());
            added.push(name.clone());
        }
        added
    }

    /// Process one step over the parameters of its file
    ///
    /// `file_params` is renamed and extended in place only after every
    /// forced and derived value was computed.
    ///
    /// # Errors
    /// - [`StepError::Evaluation`] for a failing forced or derived expression
    /// - [`StepError::Expression`] / [`StepError::Rename`] for a bad rename prefix
    pub fn process_step(
        &self,
        filename: &str,
        file_params: &mut ParameterSet,
        step: &ConfigurationStep,
        variables: &Variables,
    ) -> StepResult<StepOutcome> {
        let variables = self.variables(variables);
        let forced = self.compute_forced_values(filename, step, &variables)?;
        let derived = self.compute_derived_values(filename, step, &variables)?;

        let mut outcome = StepOutcome::default();

        if let Some(prefix) = &step.rename_connection {
            let renames = ConnectionRenamer::apply_renames(file_params, prefix, Some(&variables))?;
            for (old, new) in &renames.renamed {
                outcome.feedback.push(Feedback::new(
                    "Parameter Renamed",
                    format!("In file '{filename}': renamed parameter '{old}' to '{new}'"),
                ));
            }
            for duplicate in &renames.duplicates {
                outcome.feedback.push(Feedback::new(
                    "Parameter Removed",
                    format!("In file '{filename}': removed duplicate parameter '{duplicate}'"),
                ));
            }
            outcome.renamed = renames.renamed;
            outcome.duplicates = renames.duplicates;
        }

        let passes = [(OverrideKind::Forced, &forced), (OverrideKind::Derived, &derived)];
        for (kind, overrides) in passes {
            for name in self.merge_overrides(file_params, overrides) {
                tracing::info!("In file '{filename}': added {kind} parameter {name}");
                outcome.feedback.push(Feedback::new(
                    "Parameter Added",
                    format!("In file '{filename}': added {kind} parameter '{name}'"),
                ));
                outcome.added.push(name);
            }
        }

        outcome.parameters = file_params
            .iter()
            .map(|(name, record)| {
                let parameter = ArduPilotParameter::new(name.clone(), record)
                    .with_metadata(self.doc_index.get(name).cloned().unwrap_or_default())
                    .with_default(self.defaults.get(name).map(ParameterRecord::value))
                    .with_fc_value(self.fc_parameters.get(name).copied())
                    .with_derived(derived.get(name).cloned())
                    .with_forced(forced.get(name).cloned())
                    .with_tolerance(self.tolerance);
                (name.clone(), parameter)
            })
            .collect();

        tracing::debug!(
            "In file '{filename}': {} parameters, {} forced, {} derived",
            outcome.parameters.len(),
            forced.len(),
            derived.len()
        );
        Ok(outcome)
    }
}

/// Write the working copy of every changed parameter back into `file_params`
///
/// Returns the number of entries written.
pub fn apply_edits<'a>(
    file_params: &mut ParameterSet,
    parameters: impl IntoIterator<Item = &'a ArduPilotParameter>,
) -> usize {
    let mut written = 0;
    for parameter in parameters {
        let record = parameter.to_record();
        if file_params.get(parameter.name()) != Some(&record) {
            file_params.insert(parameter.name().to_string(), record);
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_docs::{DocumentationEntry, VehicleType};
    use pretty_assertions::assert_eq;

    const XML: &str = r#"<paramfile>
      <param name="BATT_MONITOR" humanName="Battery monitoring">
        <values><value code="0">Disabled</value><value code="4">Analog Voltage and Current</value></values>
      </param>
      <param name="LOG_BITMASK" humanName="Log bitmask">
        <field name="Bitmask">0:Fast Attitude,1:Medium Attitude,2:GPS</field>
      </param>
    </paramfile>"#;

    fn processor() -> ConfigurationStepProcessor {
        let index =
            DocumentationIndex::from_xml(XML, "t.xml", VehicleType::ArduCopter, 100).unwrap();
        ConfigurationStepProcessor::new(index, ParameterSet::new())
    }

    fn step(derived: &[(&str, &str)]) -> ConfigurationStep {
        ConfigurationStep {
            derived_parameters: derived
                .iter()
                .map(|(n, e)| ((*n).to_string(), ParameterOverride::new(*e, "because")))
                .collect(),
            ..ConfigurationStep::default()
        }
    }

    #[test]
    fn string_results_map_through_documentation() {
        let p = processor();
        let values = p
            .compute_derived_values(
                "f.param",
                &step(&[
                    ("BATT_MONITOR", "'Analog Voltage and Current'"),
                    ("LOG_BITMASK", "'GPS'"),
                ]),
                &Variables::new(),
            )
            .unwrap();
        assert_eq!(values["BATT_MONITOR"].value(), 4.0);
        assert_eq!(values["LOG_BITMASK"].value(), 4.0);
        assert_eq!(values["BATT_MONITOR"].comment(), Some("because"));
    }

    #[test]
    fn unknown_label_aborts_the_step() {
        let err = processor()
            .compute_derived_values(
                "f.param",
                &step(&[("BATT_CAPACITY", "1000"), ("BATT_MONITOR", "'Smart battery'")]),
                &Variables::new(),
            )
            .unwrap_err();
        let message = err.to_string();
        assert!(
            message.starts_with("In file 'f.param': 'BATT_MONITOR' derived parameter"),
            "{message}"
        );
        assert!(message.contains("Smart battery"), "{message}");
    }

    #[test]
    fn fc_parameters_require_a_connection() {
        let derived = step(&[("ATC_RAT_RLL_FLTD", "fc_parameters['INS_GYRO_FILTER'] / 2")]);
        let err = processor()
            .compute_derived_values("f.param", &derived, &processor().variables(&Variables::new()))
            .unwrap_err();
        assert!(err.to_string().contains("is the flight controller connected?"));

        let mut fc = IndexMap::new();
        fc.insert("INS_GYRO_FILTER".to_string(), 80.0);
        let connected = processor().with_fc_parameters(fc);
        let values = connected
            .compute_derived_values("f.param", &derived, &connected.variables(&Variables::new()))
            .unwrap();
        assert_eq!(values["ATC_RAT_RLL_FLTD"].value(), 40.0);
    }

    #[test]
    fn merge_only_adds_missing_known_names() {
        let mut fc = IndexMap::new();
        fc.insert("BATT_MONITOR".to_string(), 0.0);
        fc.insert("BATT_CAPACITY".to_string(), 0.0);
        let p = processor().with_fc_parameters(fc);

        let mut file: ParameterSet = [("BATT_CAPACITY", ParameterRecord::from_value(3300.0))]
            .into_iter()
            .collect();
        let mut overrides = Overrides::new();
        overrides.insert("BATT_CAPACITY".to_string(), ParameterRecord::from_value(5000.0));
        overrides.insert("BATT_MONITOR".to_string(), ParameterRecord::from_value(4.0));
        overrides.insert("NOT_ON_FC".to_string(), ParameterRecord::from_value(1.0));

        assert_eq!(p.merge_overrides(&mut file, &overrides), vec!["BATT_MONITOR".to_string()]);
        assert_eq!(file.get("BATT_CAPACITY").unwrap().value(), 3300.0);
        assert!(!file.contains("NOT_ON_FC"));
    }

    #[test]
    fn apply_edits_writes_changed_values() {
        let mut file: ParameterSet =
            [("PARAM1", ParameterRecord::from_value(1.0))].into_iter().collect();
        let mut param = ArduPilotParameter::new("PARAM1", file.get("PARAM1").unwrap())
            .with_metadata(DocumentationEntry::default());
        assert_eq!(apply_edits(&mut file, [&param]), 0);

        param.set_new_value("2", false).unwrap();
        param.set_change_reason("tuned");
        assert_eq!(apply_edits(&mut file, [&param]), 1);
        assert_eq!(file.get("PARAM1"), Some(&ParameterRecord::new(2.0, Some("tuned".to_string()))));
    }
}
