//! Supported vehicle types and their documentation URLs

use crate::error::DocError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Server hosting the generated parameter documentation
pub const BASE_URL: &str = "https://autotest.ardupilot.org/Parameters/";

/// Documentation file name on the server and in the cache directory
pub const PARAM_DEFINITION_XML_FILE: &str = "apm.pdef.xml";

/// Vehicle firmware families with published parameter documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum VehicleType {
    #[serde(rename = "AP_Periph")]
    ApPeriph,
    AntennaTracker,
    ArduCopter,
    ArduPlane,
    ArduSub,
    Blimp,
    /// Traditional helicopter, documented with the copter tree
    Heli,
    Rover,
    #[serde(rename = "SITL")]
    Sitl,
}

impl VehicleType {
    /// Every supported vehicle type
    pub const ALL: [Self; 9] = [
        Self::ApPeriph,
        Self::AntennaTracker,
        Self::ArduCopter,
        Self::ArduPlane,
        Self::ArduSub,
        Self::Blimp,
        Self::Heli,
        Self::Rover,
        Self::Sitl,
    ];

    /// Name as used on the documentation server
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApPeriph => "AP_Periph",
            Self::AntennaTracker => "AntennaTracker",
            Self::ArduCopter => "ArduCopter",
            Self::ArduPlane => "ArduPlane",
            Self::ArduSub => "ArduSub",
            Self::Blimp => "Blimp",
            Self::Heli => "Heli",
            Self::Rover => "Rover",
            Self::Sitl => "SITL",
        }
    }

    /// Prefix the XML puts in front of vehicle-specific parameter names
    ///
    /// Traditional helicopters are documented as `Helicopter:`.
    #[must_use]
    pub fn doc_prefix(self) -> &'static str {
        match self {
            Self::Heli => "Helicopter",
            other => other.as_str(),
        }
    }

    /// Versioned subdirectory on the documentation server
    #[must_use]
    pub fn versioned_subdir(self) -> &'static str {
        match self {
            Self::ArduCopter | Self::Heli => "versioned/Copter/stable-",
            Self::ArduPlane => "versioned/Plane/stable-",
            Self::Rover => "versioned/Rover/stable-",
            Self::ArduSub => "versioned/Sub/stable-",
            Self::AntennaTracker => "versioned/Tracker/stable-",
            Self::ApPeriph => "versioned/Periph/stable-",
            Self::Blimp => "versioned/Blimp/stable-",
            Self::Sitl => "versioned/SITL/stable-",
        }
    }

    /// Directory URL holding the documentation for this vehicle
    ///
    /// With a firmware version the versioned (stable) tree is used, otherwise
    /// the development tree.
    #[must_use]
    pub fn xml_url(self, firmware_version: Option<&str>) -> String {
        match firmware_version.filter(|v| !v.is_empty()) {
            Some(version) => format!("{BASE_URL}{}{version}/", self.versioned_subdir()),
            None => format!("{BASE_URL}{}/", self.as_str()),
        }
    }

    /// Development-tree documentation file, the last fallback of a fetch
    #[must_use]
    pub fn dev_fallback_url(self) -> String {
        format!("{BASE_URL}{}/{PARAM_DEFINITION_XML_FILE}", self.as_str())
    }
}

impl Display for VehicleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DocError::UnsupportedVehicle(s.to_string()))
    }
}
