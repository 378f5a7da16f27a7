//! Sort keys and line rendering for the two parameter file dialects

use crate::error::ParamFileError;
use crate::name::extract_parameter_name;
use crate::record::format_value;
use crate::set::ParameterSet;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// On-disk parameter file dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `NAME,VALUE`, sorted by underscore-separated name parts
    MissionPlanner,
    /// `NAME VALUE` in fixed-width columns, sorted by plain name
    MavProxy,
}

impl Dialect {
    /// Name used on the command line and in configuration
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissionPlanner => "missionplanner",
            Self::MavProxy => "mavproxy",
        }
    }

    /// Order two parameter names (or raw lines) for this dialect
    #[must_use]
    pub fn compare(self, a: &str, b: &str) -> std::cmp::Ordering {
        match self {
            Self::MissionPlanner => missionplanner_sort_key(a).cmp(&missionplanner_sort_key(b)),
            Self::MavProxy => mavproxy_sort_key(a).cmp(mavproxy_sort_key(b)),
        }
    }

    /// Render one parameter line
    #[must_use]
    pub fn format_line(self, name: &str, record: &crate::ParameterRecord) -> String {
        let body = match self {
            Self::MissionPlanner => format!("{name},{}", format_value(record.value())),
            Self::MavProxy => format!("{name:<16} {:<8.6}", record.value()),
        };
        match record.comment() {
            Some(comment) => format!("{body}  # {comment}"),
            None => body,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = ParamFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missionplanner" => Ok(Self::MissionPlanner),
            "mavproxy" => Ok(Self::MavProxy),
            other => Err(ParamFileError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Mission Planner sort key: the name split on `_`
///
/// Compared element-wise, so `RC_1_MIN` < `RC_FEEL` < `RC_MAP_PITCH`.
#[must_use]
pub fn missionplanner_sort_key(item: &str) -> Vec<&str> {
    extract_parameter_name(item).split('_').collect()
}

/// MAVProxy sort key: the plain name, compared as ASCII
#[inline]
#[must_use]
pub fn mavproxy_sort_key(item: &str) -> &str {
    extract_parameter_name(item)
}

/// Render all parameters of `set`, sorted for the dialect
#[must_use]
pub fn format_for_write(set: &ParameterSet, dialect: Dialect) -> Vec<String> {
    let mut entries: Vec<_> = set.iter().collect();
    entries.sort_by(|(a, _), (b, _)| dialect.compare(a, b));
    entries
        .into_iter()
        .map(|(name, record)| dialect.format_line(name, record))
        .collect()
}
