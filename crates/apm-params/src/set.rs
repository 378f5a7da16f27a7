//! Ordered parameter collections and the parameter file reader
//!
//! Two on-disk dialects are accepted and detected per line:
//! - Mission Planner: `NAME,VALUE`
//! - MAVProxy: `NAME VALUE` or `NAME<TAB>VALUE`
//!
//! Either may carry a trailing `# comment`, which becomes the record's
//! change reason.

use crate::error::{ParamFileError, ParamResult};
use crate::format::Dialect;
use crate::name::{is_valid_name, PARAM_NAME_MAX_LEN};
use crate::record::ParameterRecord;
use crate::write::write_lines;
use indexmap::map::{IntoIter, Iter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordered mapping from parameter name to [`ParameterRecord`]
///
/// Insertion order is preserved; it is the file order for parsed sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: IndexMap<String, ParameterRecord>,
}

impl ParameterSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a parameter file
    ///
    /// # Errors
    /// Returns [`ParamFileError::Io`] if the file cannot be read, or the first
    /// grammar violation found (see [`ParameterSet::parse_str`]).
    pub fn from_file(path: impl AsRef<Path>) -> ParamResult<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ParamFileError::io_error(path, e))?;
        let set = Self::parse_str(&content, path)?;
        tracing::debug!("Loaded {} parameters from {}", set.len(), path.display());
        Ok(set)
    }

    /// Parse parameter file content; `source` is only used in error messages
    ///
    /// Blank lines and lines starting with `#` are skipped. The separator is
    /// the first of `,`, space or tab present in the line, in that priority.
    ///
    /// # Errors
    /// Fails on the first malformed line, invalid or too long name, duplicated
    /// name, or non-finite value.
    pub fn parse_str(content: &str, source: &Path) -> ParamResult<Self> {
        let mut set = Self::new();
        for (idx, raw) in content.lines().enumerate() {
            let line_nr = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (line, comment) = match line.split_once('#') {
                Some((body, comment)) => (body, Some(comment.to_string())),
                None => (line, None),
            };
            let Some((name, value)) = split_name_value(line) else {
                return Err(ParamFileError::MissingSeparator {
                    path: source.to_path_buf(),
                    line: line_nr,
                    text: line.to_string(),
                });
            };
            let name = name.trim();
            set.validate_new_name(name, source, line_nr)?;
            let value = parse_value(value).ok_or_else(|| ParamFileError::InvalidValue {
                path: source.to_path_buf(),
                line: line_nr,
                value: value.trim().to_string(),
            })?;
            set.params
                .insert(name.to_string(), ParameterRecord::new(value, comment));
        }
        Ok(set)
    }

    fn validate_new_name(&self, name: &str, source: &Path, line_nr: usize) -> ParamResult<()> {
        if name.len() > PARAM_NAME_MAX_LEN {
            return Err(ParamFileError::NameTooLong {
                path: source.to_path_buf(),
                line: line_nr,
                name: name.to_string(),
            });
        }
        if !is_valid_name(name) {
            return Err(ParamFileError::InvalidName {
                path: source.to_path_buf(),
                line: line_nr,
                name: name.to_string(),
            });
        }
        if self.params.contains_key(name) {
            return Err(ParamFileError::DuplicateParameter {
                path: source.to_path_buf(),
                line: line_nr,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Number of parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Look up a parameter
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterRecord> {
        self.params.get(name)
    }

    /// Check if a parameter exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Insert or replace a record
    ///
    /// A new name is appended at the end; an existing name keeps its position.
    #[inline]
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        record: ParameterRecord,
    ) -> Option<ParameterRecord> {
        self.params.insert(name.into(), record)
    }

    /// Remove a record, preserving the order of the remaining ones
    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<ParameterRecord> {
        self.params.shift_remove(name)
    }

    /// Names in order
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Iterate over `(name, record)` pairs in order
    #[inline]
    pub fn iter(&self) -> Iter<'_, String, ParameterRecord> {
        self.params.iter()
    }

    /// Render as sorted lines in the given dialect
    #[must_use]
    pub fn format_for_write(&self, dialect: Dialect) -> Vec<String> {
        crate::format::format_for_write(self, dialect)
    }

    /// Render in the given dialect and replace `path` with the result
    ///
    /// An empty set writes nothing.
    ///
    /// # Errors
    /// Returns [`ParamFileError::Io`] if the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>, dialect: Dialect) -> ParamResult<()> {
        let lines = self.format_for_write(dialect);
        if lines.is_empty() {
            return Ok(());
        }
        write_lines(&lines, path.as_ref())
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = (&'a String, &'a ParameterRecord);
    type IntoIter = Iter<'a, String, ParameterRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, ParameterRecord);
    type IntoIter = IntoIter<String, ParameterRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}

impl<S: Into<String>> FromIterator<(S, ParameterRecord)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (S, ParameterRecord)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Split on the first `,`, else the first space, else the first tab
fn split_name_value(line: &str) -> Option<(&str, &str)> {
    [',', ' ', '\t']
        .into_iter()
        .find_map(|sep| line.split_once(sep))
}

fn parse_value(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
