//! Fetch and annotation configuration

use crate::error::{DocError, DocResult};
use apm_params::Dialect;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default documentation line width
pub const DEFAULT_MAX_LINE_LENGTH: usize = 100;

/// Allowed documentation line widths
pub const MAX_LINE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 50..=300;

/// HTTP(S) proxy settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy for `http://` URLs
    pub http: Option<String>,
    /// Proxy for `https://` URLs
    pub https: Option<String>,
    /// Comma-separated hosts bypassing the proxy
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// Read `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY` (uppercase wins over
    /// lowercase) from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ProxySettings::from_env`] with an injectable lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |upper: &str, lower: &str| {
            lookup(upper)
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(lower).filter(|v| !v.is_empty()))
        };
        Self {
            http: pick("HTTP_PROXY", "http_proxy"),
            https: pick("HTTPS_PROXY", "https_proxy"),
            no_proxy: pick("NO_PROXY", "no_proxy"),
        }
    }

    /// Check if no proxy is configured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none() && self.no_proxy.is_none()
    }
}

/// Documentation fetch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout applied to each request of the fallback chain
    pub timeout: Duration,
    /// Proxy settings
    pub proxies: ProxySettings,
}

impl FetchConfig {
    /// Create default configuration, proxies taken from the environment
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With explicit proxy settings
    #[inline]
    #[must_use]
    pub fn with_proxies(mut self, proxies: ProxySettings) -> Self {
        self.proxies = proxies;
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxies: ProxySettings::from_env(),
        }
    }
}

/// Parameter line ordering applied while annotating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Keep file order
    #[default]
    None,
    /// Mission Planner order
    MissionPlanner,
    /// MAVProxy order
    MavProxy,
}

impl SortMode {
    /// Dialect whose sort key this mode uses
    #[inline]
    #[must_use]
    pub fn dialect(self) -> Option<Dialect> {
        match self {
            Self::None => None,
            Self::MissionPlanner => Some(Dialect::MissionPlanner),
            Self::MavProxy => Some(Dialect::MavProxy),
        }
    }
}

impl Display for SortMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.dialect() {
            Some(dialect) => Display::fmt(&dialect, f),
            None => f.write_str("none"),
        }
    }
}

impl FromStr for SortMode {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "missionplanner" => Ok(Self::MissionPlanner),
            "mavproxy" => Ok(Self::MavProxy),
            other => Err(DocError::UnsupportedSortMode(other.to_string())),
        }
    }
}

/// Annotation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateConfig {
    /// Line ordering
    pub sort: SortMode,
    /// Remove generated comments instead of regenerating them
    pub delete_only: bool,
    /// Documentation wrap width
    pub max_line_length: usize,
    /// Total width of the choice-value column layout
    pub column_width: usize,
    /// Upper bound on choice-value columns
    pub max_columns: usize,
}

impl AnnotateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With sort mode
    #[inline]
    #[must_use]
    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    /// With delete-only mode
    #[inline]
    #[must_use]
    pub fn with_delete_only(mut self, delete_only: bool) -> Self {
        self.delete_only = delete_only;
        self
    }

    /// With documentation wrap width
    ///
    /// # Errors
    /// Returns [`DocError::InvalidConfig`] outside [`MAX_LINE_LENGTH_RANGE`].
    pub fn with_max_line_length(mut self, max_line_length: usize) -> DocResult<Self> {
        if !MAX_LINE_LENGTH_RANGE.contains(&max_line_length) {
            return Err(DocError::InvalidConfig(format!(
                "max line length {max_line_length} not in {}..={}",
                MAX_LINE_LENGTH_RANGE.start(),
                MAX_LINE_LENGTH_RANGE.end()
            )));
        }
        self.max_line_length = max_line_length;
        Ok(self)
    }
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            sort: SortMode::None,
            delete_only: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            column_width: 105,
            max_columns: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn uppercase_proxy_wins() {
        let env: HashMap<&str, &str> = [
            ("HTTP_PROXY", "http://upper:3128"),
            ("http_proxy", "http://lower:3128"),
            ("https_proxy", "http://lower:3129"),
        ]
        .into_iter()
        .collect();
        let proxies = ProxySettings::from_lookup(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(proxies.http.as_deref(), Some("http://upper:3128"));
        assert_eq!(proxies.https.as_deref(), Some("http://lower:3129"));
        assert_eq!(proxies.no_proxy, None);
    }

    #[test]
    fn empty_env_has_no_proxies() {
        assert!(ProxySettings::from_lookup(|_| None).is_empty());
    }

    #[test]
    fn sort_mode_parse() {
        assert_eq!("none".parse::<SortMode>().unwrap(), SortMode::None);
        assert_eq!("mavproxy".parse::<SortMode>().unwrap().dialect(), Some(Dialect::MavProxy));
        assert!("alphabetic".parse::<SortMode>().is_err());
        assert_eq!(SortMode::MissionPlanner.to_string(), "missionplanner");
    }

    #[test]
    fn max_line_length_bounds() {
        assert!(AnnotateConfig::new().with_max_line_length(49).is_err());
        assert!(AnnotateConfig::new().with_max_line_length(301).is_err());
        assert_eq!(
            AnnotateConfig::new().with_max_line_length(300).unwrap().max_line_length,
            300
        );
    }
}
