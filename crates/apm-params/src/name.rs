//! Parameter name grammar
//!
//! ArduPilot names are upper-case ASCII, start with a letter and are at most
//! [`PARAM_NAME_MAX_LEN`] characters long.

use crate::error::{ParamFileError, ParamResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Maximum length of a parameter name
pub const PARAM_NAME_MAX_LEN: usize = 16;

/// Leading-name pattern, matched against the start of a line
pub const PARAM_NAME_REGEX: &str = r"^[A-Z][A-Z_0-9]*";

static NAME_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(PARAM_NAME_REGEX).unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Characters accepted between a name and its value
pub const SEPARATORS: [char; 3] = [',', ' ', '\t'];

/// Leading parameter name of `item`, or the trimmed item itself when it
/// does not start with one
///
/// Used as a sort key, so it never fails.
#[must_use]
pub fn extract_parameter_name(item: &str) -> &str {
    let item = item.trim();
    NAME_PREFIX.find(item).map_or(item, |m| m.as_str())
}

/// Check that `name` is a complete, well-formed parameter name
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= PARAM_NAME_MAX_LEN
        && NAME_PREFIX
            .find(name)
            .is_some_and(|m| m.end() == name.len())
}

/// Extract the name at the start of a stripped parameter line and check the
/// separator that follows it
///
/// # Errors
/// - [`ParamFileError::InvalidName`] if the line does not start with a name
/// - [`ParamFileError::NameTooLong`] if the name exceeds the length limit
/// - [`ParamFileError::MissingSeparator`] if nothing follows the name
/// - [`ParamFileError::InvalidSeparator`] if the next character is not `,`, space or tab
pub fn extract_parameter_name_and_validate<'a>(
    line: &'a str,
    path: &Path,
    line_nr: usize,
) -> ParamResult<&'a str> {
    let Some(m) = NAME_PREFIX.find(line) else {
        return Err(ParamFileError::InvalidName {
            path: path.to_path_buf(),
            line: line_nr,
            name: line.to_string(),
        });
    };
    let name = m.as_str();
    if name.len() > PARAM_NAME_MAX_LEN {
        return Err(ParamFileError::NameTooLong {
            path: path.to_path_buf(),
            line: line_nr,
            name: name.to_string(),
        });
    }
    match line[name.len()..].chars().next() {
        None => Err(ParamFileError::MissingSeparator {
            path: path.to_path_buf(),
            line: line_nr,
            text: line.to_string(),
        }),
        Some(c) if SEPARATORS.contains(&c) => Ok(name),
        Some(_) => Err(ParamFileError::InvalidSeparator {
            path: path.to_path_buf(),
            line: line_nr,
            text: line.to_string(),
        }),
    }
}
