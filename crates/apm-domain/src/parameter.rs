//! One parameter of a configuration step, with everything known about it
//!
//! An [`ArduPilotParameter`] combines:
//! - the on-file record and a working copy (`new_value`, `change_reason`)
//! - the documentation entry, default value and flight controller value
//! - optional forced and derived overrides
//!
//! A forced override beats a derived one. An active override is seeded into
//! the working copy and locks it against edits.

use crate::bitmask::{parse_int_auto_radix, BitLabels, BitmaskHelper};
use crate::error::{DomainResult, Lock, ParameterError};
use crate::tolerance::Tolerance;
use apm_docs::DocumentationEntry;
use apm_params::{format_value, ParameterRecord};
use indexmap::IndexMap;

/// Parameters whose documented choices are suggestions rather than the full
/// set of legal values
pub const MULTIPLE_CHOICE_EXCLUDED: [&str; 4] =
    ["MOT_PWM_MAX", "MOT_PWM_MIN", "RC_SPEED", "SCHED_LOOP_RATE"];

/// Parameter of a configuration step
#[derive(Debug, Clone, PartialEq)]
pub struct ArduPilotParameter {
    name: String,
    value_on_file: f64,
    change_reason_on_file: Option<String>,
    new_value: f64,
    change_reason: Option<String>,
    metadata: DocumentationEntry,
    default_value: Option<f64>,
    fc_value: Option<f64>,
    forced: Option<ParameterRecord>,
    derived: Option<ParameterRecord>,
    tolerance: Tolerance,
}

impl ArduPilotParameter {
    /// Create parameter from its on-file record
    #[must_use]
    pub fn new(name: impl Into<String>, record: &ParameterRecord) -> Self {
        let reason = record.comment().map(str::to_string);
        Self {
            name: name.into(),
            value_on_file: record.value(),
            change_reason_on_file: reason.clone(),
            new_value: record.value(),
            change_reason: reason,
            metadata: DocumentationEntry::default(),
            default_value: None,
            fc_value: None,
            forced: None,
            derived: None,
            tolerance: Tolerance::default(),
        }
    }

    /// With documentation
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: DocumentationEntry) -> Self {
        self.metadata = metadata;
        self
    }

    /// With firmware default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, default_value: Option<f64>) -> Self {
        self.default_value = default_value;
        self
    }

    /// With value read from the flight controller
    #[inline]
    #[must_use]
    pub fn with_fc_value(mut self, fc_value: Option<f64>) -> Self {
        self.fc_value = fc_value;
        self
    }

    /// With forced override
    #[must_use]
    pub fn with_forced(mut self, forced: Option<ParameterRecord>) -> Self {
        self.forced = forced;
        self.seed_from_override();
        self
    }

    /// With derived override
    #[must_use]
    pub fn with_derived(mut self, derived: Option<ParameterRecord>) -> Self {
        self.derived = derived;
        self.seed_from_override();
        self
    }

    /// With comparison tolerance for continuous values
    #[inline]
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn seed_from_override(&mut self) {
        let active = self.active_override().cloned();
        if let Some(record) = active {
            self.new_value = record.value();
            self.change_reason = record.comment().map(str::to_string);
        } else {
            self.new_value = self.value_on_file;
            self.change_reason = self.change_reason_on_file.clone();
        }
    }

    fn active_override(&self) -> Option<&ParameterRecord> {
        self.forced
            .as_ref()
            .filter(|r| r.is_finite())
            .or_else(|| self.derived.as_ref().filter(|r| r.is_finite()))
    }

    fn lock(&self) -> Option<Lock> {
        if self.is_forced() {
            Some(Lock::Forced)
        } else if self.is_derived() {
            Some(Lock::Derived)
        } else {
            None
        }
    }

    // Accessors

    /// Parameter name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value in the parameter file
    #[inline]
    #[must_use]
    pub fn value_on_file(&self) -> f64 {
        self.value_on_file
    }

    /// Comment in the parameter file
    #[inline]
    #[must_use]
    pub fn change_reason_on_file(&self) -> Option<&str> {
        self.change_reason_on_file.as_deref()
    }

    /// Working value
    #[inline]
    #[must_use]
    pub fn new_value(&self) -> f64 {
        self.new_value
    }

    /// Working value rendered as in a parameter file
    #[inline]
    #[must_use]
    pub fn new_value_as_string(&self) -> String {
        format_value(self.new_value)
    }

    /// Working change reason
    #[inline]
    #[must_use]
    pub fn change_reason(&self) -> Option<&str> {
        self.change_reason.as_deref()
    }

    /// Firmware default value
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<f64> {
        self.default_value
    }

    /// Flight controller value
    #[inline]
    #[must_use]
    pub fn fc_value(&self) -> Option<f64> {
        self.fc_value
    }

    /// Documentation entry; empty when undocumented
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &DocumentationEntry {
        &self.metadata
    }

    /// Display name, empty when undocumented
    #[inline]
    #[must_use]
    pub fn human_name(&self) -> &str {
        &self.metadata.human_name
    }

    /// Unit of measure
    #[inline]
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.metadata.field("Units")
    }

    /// Documented choices, code → label
    #[inline]
    #[must_use]
    pub fn choices(&self) -> &IndexMap<String, String> {
        &self.metadata.choices
    }

    /// Documented bit labels; empty unless a bitmask
    #[must_use]
    pub fn bit_labels(&self) -> BitLabels {
        self.metadata
            .field("Bitmask")
            .map(BitmaskHelper::parse_field)
            .unwrap_or_default()
    }

    /// Lower bound from `min`, else from `Range`
    #[must_use]
    pub fn min_value(&self) -> Option<f64> {
        self.bound("min", 0)
    }

    /// Upper bound from `max`, else from `Range`
    #[must_use]
    pub fn max_value(&self) -> Option<f64> {
        self.bound("max", 1)
    }

    fn bound(&self, field: &str, range_index: usize) -> Option<f64> {
        if let Some(v) = self.metadata.field(field).and_then(|v| v.trim().parse().ok()) {
            return Some(v);
        }
        self.metadata
            .field("Range")
            .and_then(|range| range.split_whitespace().nth(range_index))
            .and_then(|v| v.parse().ok())
    }

    // Properties

    /// Documented as read-only
    #[inline]
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.metadata.flag("ReadOnly")
    }

    /// Documented as a calibration result
    #[inline]
    #[must_use]
    pub fn is_calibration(&self) -> bool {
        self.metadata.flag("Calibration")
    }

    /// Documented as a bitmask
    #[inline]
    #[must_use]
    pub fn is_bitmask(&self) -> bool {
        self.metadata.fields.contains_key("Bitmask")
    }

    /// Current value is one of the documented choices
    #[must_use]
    pub fn is_multiple_choice(&self) -> bool {
        !self.metadata.choices.is_empty()
            && self.metadata.choices.contains_key(&self.new_value_as_string())
            && !MULTIPLE_CHOICE_EXCLUDED.contains(&self.name.as_str())
    }

    /// Pinned by an active forced override
    #[inline]
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.forced.as_ref().is_some_and(ParameterRecord::is_finite)
    }

    /// Computed by an active derived override that is not shadowed by a forced one
    #[inline]
    #[must_use]
    pub fn is_derived(&self) -> bool {
        !self.is_forced() && self.derived.as_ref().is_some_and(ParameterRecord::is_finite)
    }

    /// Accepts user edits
    #[inline]
    #[must_use]
    pub fn is_editable(&self) -> bool {
        !self.is_forced() && !self.is_derived() && !self.is_readonly()
    }

    // Comparisons

    #[allow(clippy::float_cmp)]
    fn values_equal(&self, a: f64, b: f64) -> bool {
        if self.is_bitmask() || self.is_multiple_choice() {
            a == b
        } else {
            self.tolerance.is_within(a, b)
        }
    }

    /// Flight controller value equals the default
    #[must_use]
    pub fn fc_value_equals_default(&self) -> bool {
        matches!(
            (self.fc_value, self.default_value),
            (Some(fc), Some(d)) if self.values_equal(fc, d)
        )
    }

    /// Working value equals the default
    #[must_use]
    pub fn new_value_equals_default(&self) -> bool {
        self.default_value
            .is_some_and(|d| self.values_equal(self.new_value, d))
    }

    /// Working value differs from a known flight controller value
    #[must_use]
    pub fn is_different_from_fc(&self) -> bool {
        self.fc_value
            .is_some_and(|fc| !self.values_equal(self.new_value, fc))
    }

    /// Working copy differs from the file
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.values_equal(self.new_value, self.value_on_file)
            || self.change_reason != self.change_reason_on_file
    }

    // Mutation

    /// Validate `text` and make it the working value
    ///
    /// Returns the accepted value. With `ignore_out_of_range` the bound and
    /// bitmask checks are skipped.
    ///
    /// # Errors
    /// - [`ParameterError::NotEditable`] if forced or derived, whatever the input
    /// - [`ParameterError::Invalid`] for unparsable or non-finite text
    /// - [`ParameterError::Unchanged`] if the value is the current one
    /// - [`ParameterError::OutOfRange`] / [`ParameterError::DisallowedBits`]
    pub fn set_new_value(&mut self, text: &str, ignore_out_of_range: bool) -> DomainResult<f64> {
        if let Some(lock) = self.lock() {
            return Err(ParameterError::NotEditable {
                name: self.name.clone(),
                lock,
            });
        }

        let value = if self.is_multiple_choice() {
            let value = self.parse_float(text)?;
            self.ensure_changed(value == self.new_value)?;
            value
        } else if self.is_bitmask() {
            self.parse_bitmask(text, ignore_out_of_range)?
        } else {
            let value = self.parse_float(text)?;
            self.ensure_changed(self.tolerance.is_within(value, self.new_value))?;
            if !ignore_out_of_range && !self.in_range(value) {
                return Err(ParameterError::OutOfRange {
                    name: self.name.clone(),
                    value,
                    min: self.min_value(),
                    max: self.max_value(),
                });
            }
            value
        };

        tracing::debug!(
            "{}: {} -> {}",
            self.name,
            format_value(self.new_value),
            format_value(value)
        );
        self.new_value = value;
        Ok(value)
    }

    fn parse_bitmask(&self, text: &str, ignore_out_of_range: bool) -> DomainResult<f64> {
        let value = parse_int_auto_radix(text).ok_or_else(|| self.invalid(text, "not an integer"))?;
        #[allow(clippy::cast_precision_loss)]
        let as_float = value as f64;
        self.ensure_changed(as_float == self.new_value)?;
        let bits = BitmaskHelper::disallowed_bits(value, &self.bit_labels());
        if bits != 0 && !ignore_out_of_range {
            return Err(ParameterError::DisallowedBits {
                name: self.name.clone(),
                value,
                bits,
            });
        }
        Ok(as_float)
    }

    fn parse_float(&self, text: &str) -> DomainResult<f64> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| self.invalid(text, "not a number"))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(text, "NaN and infinity are not allowed"))
        }
    }

    fn invalid(&self, text: &str, reason: &str) -> ParameterError {
        ParameterError::Invalid {
            name: self.name.clone(),
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }

    fn ensure_changed(&self, unchanged: bool) -> DomainResult<()> {
        if unchanged {
            Err(ParameterError::Unchanged {
                name: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn in_range(&self, value: f64) -> bool {
        self.min_value().map_or(true, |min| value >= min)
            && self.max_value().map_or(true, |max| value <= max)
    }

    /// Replace the working change reason
    ///
    /// Returns `false` when nothing changed: forced or derived parameter,
    /// same text, or empty text over no reason.
    pub fn set_change_reason(&mut self, text: &str) -> bool {
        if self.lock().is_some() || self.change_reason.as_deref() == Some(text) {
            return false;
        }
        if text.is_empty() && self.change_reason.is_none() {
            return false;
        }
        self.change_reason = Some(text.to_string());
        true
    }

    /// Set the working value from checked bits
    ///
    /// # Errors
    /// Same as [`ArduPilotParameter::set_new_value`].
    pub fn set_checked_bits(&mut self, bits: impl IntoIterator<Item = u32>) -> DomainResult<f64> {
        let value = BitmaskHelper::value_from_keys(bits);
        self.set_new_value(&value.to_string(), false)
    }

    /// Working copy as a file record
    #[must_use]
    pub fn to_record(&self) -> ParameterRecord {
        ParameterRecord::new(self.new_value, self.change_reason.clone())
    }
}
