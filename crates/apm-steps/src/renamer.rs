//! Connection-prefixed parameter renaming
//!
//! Moving a peripheral to another port renames its parameters, e.g.
//! `SERIAL1_BAUD` → `SERIAL3_BAUD` or `CAN_P1_DRIVER` → `CAN_P2_DRIVER`.

use crate::error::{StepError, StepResult};
use crate::expr::{Expression, Value, Variables};
use apm_params::ParameterSet;
use indexmap::{IndexMap, IndexSet};

/// Result of applying renames to a parameter set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameOutcome {
    /// Entries dropped because their new name was already taken
    pub duplicates: IndexSet<String>,
    /// `(old, new)` pairs actually moved; identity renames excluded
    pub renamed: Vec<(String, String)>,
}

/// Connection renamer
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionRenamer;

impl ConnectionRenamer {
    /// Compute `old name → new name` for every name affected by `new_prefix`
    ///
    /// `new_prefix` is the connection type followed by one digit (`CAN2`,
    /// `SERIAL3`). CAN names are special: `CAN_P1_*` and `CAN_D1_*` keep their
    /// `CAN_P`/`CAN_D` part and only the number changes.
    #[must_use]
    pub fn generate_renames<'a>(
        names: impl IntoIterator<Item = &'a str>,
        new_prefix: &str,
    ) -> IndexMap<String, String> {
        let mut renames = IndexMap::new();
        let Some((split, number)) = new_prefix.char_indices().last() else {
            return renames;
        };
        if new_prefix.chars().count() < 2 {
            return renames;
        }
        let new_type = &new_prefix[..split];

        for name in names {
            let mut tokens = name.split('_');
            let mut old_prefix = tokens.next().unwrap_or_default().to_string();
            let mut prefix = new_prefix.to_string();
            if new_type == "CAN" {
                for port in ["CAN_P", "CAN_D"] {
                    if name.contains(port) {
                        old_prefix = name.split('_').take(2).collect::<Vec<_>>().join("_");
                        prefix = format!("{port}{number}");
                    }
                }
            }
            if old_prefix.contains(new_type) {
                renames.insert(name.to_string(), name.replacen(&old_prefix, &prefix, 1));
            }
        }
        renames
    }

    /// Rename the parameters of `params` for `new_prefix`
    ///
    /// With `variables`, `new_prefix` is an expression that must evaluate to a
    /// string; otherwise it is the literal prefix. When two entries would end
    /// up with the same name, the later one is dropped and reported.
    ///
    /// # Errors
    /// - [`StepError::Expression`] if the prefix expression fails
    /// - [`StepError::Rename`] if it does not yield a string
    pub fn apply_renames(
        params: &mut ParameterSet,
        new_prefix: &str,
        variables: Option<&Variables>,
    ) -> StepResult<RenameOutcome> {
        let prefix = match variables {
            Some(vars) => match Expression::parse(new_prefix)?.evaluate(vars)? {
                Value::Str(s) => s,
                other => {
                    return Err(StepError::Rename(format!(
                        "'{new_prefix}' evaluated to {} '{other}', expected a string",
                        other.type_name()
                    )))
                }
            },
            None => new_prefix.to_string(),
        };

        let renames = Self::generate_renames(params.names(), &prefix);
        let mut outcome = RenameOutcome::default();
        let mut new_names = IndexSet::new();

        for (old_name, new_name) in renames {
            if new_names.contains(&new_name) {
                params.remove(&old_name);
                tracing::warn!("Removing duplicate parameter {old_name}");
                outcome.duplicates.insert(old_name);
                continue;
            }
            new_names.insert(new_name.clone());
            if new_name != old_name {
                if let Some(record) = params.remove(&old_name) {
                    params.insert(new_name.clone(), record);
                }
                tracing::info!("Renaming parameter {old_name} to {new_name}");
                outcome.renamed.push((old_name, new_name));
            }
        }
        Ok(outcome)
    }
}
