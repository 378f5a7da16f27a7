//! Testing utilities for the APM parameter workspace
//!
//! Shared fixtures: a small parameter documentation tree, an in-memory
//! document source and vehicle directories on disk.

#![allow(missing_docs)]

use apm_docs::{DocumentSource, DocumentationIndex, SourceError, VehicleType};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Documentation tree covering a bitmask, a choice list, a read-only value,
/// a ranged value, CAN driver/protocol parameters and a compass mask
pub const SAMPLE_PDEF_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<paramfile>
  <vehicles>
    <parameters name="ArduCopter">
      <param humanName="Param one" name="ArduCopter:PARAM1" documentation="First test parameter">
        <field name="Range">0 1</field>
        <field name="Increment">0.05</field>
      </param>
      <param humanName="Param two" name="ArduCopter:PARAM2" documentation="Second test parameter">
        <values>
          <value code="0">Disabled</value>
          <value code="1">Enabled</value>
          <value code="2">Auto</value>
        </values>
      </param>
    </parameters>
  </vehicles>
  <libraries>
    <parameters name="BATT_">
      <param humanName="Battery capacity" name="BATT_CAPACITY" documentation="Capacity of the battery in mAh when full">
        <field name="Range">0 100000</field>
        <field name="Units">mAh</field>
        <field name="UnitText">milliampere hour</field>
      </param>
      <param humanName="Battery monitoring" name="BATT_MONITOR" documentation="Controls enabling monitoring of the battery">
        <values>
          <value code="0">Disabled</value>
          <value code="3">Analog Voltage Only</value>
          <value code="4">Analog Voltage and Current</value>
        </values>
      </param>
    </parameters>
    <parameters name="COMPASS_">
      <param humanName="Compass disable mask" name="COMPASS_DISBLMSK" documentation="Types of compass to disable">
        <field name="Bitmask">0:HMC5883,1:LSM303D,2:AK8963,3:BMM150</field>
      </param>
    </parameters>
    <parameters name="CAN_">
      <param humanName="Driver" name="CAN_P1_DRIVER" documentation="CAN driver for port 1">
        <values>
          <value code="0">Disabled</value>
          <value code="1">First driver</value>
          <value code="2">Second driver</value>
        </values>
      </param>
      <param humanName="Driver" name="CAN_P2_DRIVER" documentation="CAN driver for port 2">
        <values>
          <value code="0">Disabled</value>
          <value code="1">First driver</value>
          <value code="2">Second driver</value>
        </values>
      </param>
      <param humanName="Protocol" name="CAN_D1_PROTOCOL" documentation="CAN protocol of driver 1">
        <values>
          <value code="0">None</value>
          <value code="1">DroneCAN</value>
        </values>
      </param>
      <param humanName="Protocol" name="CAN_D2_PROTOCOL" documentation="CAN protocol of driver 2">
        <values>
          <value code="0">None</value>
          <value code="1">DroneCAN</value>
        </values>
      </param>
    </parameters>
    <parameters name="STAT_">
      <param humanName="Boot Count" name="STAT_BOOTCNT" documentation="Number of times board has been booted">
        <field name="ReadOnly">True</field>
      </param>
    </parameters>
  </libraries>
</paramfile>
"#;

/// Magnetometer calibration script documentation
pub const SAMPLE_MAGFIT_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<paramfile>
  <libraries>
    <parameters name="MAGH_">
      <param humanName="Altitude delta" name="MAGH_ALT_DELTA" documentation="Altitude change that triggers a new fit">
        <field name="Units">m</field>
      </param>
    </parameters>
  </libraries>
</paramfile>
"#;

pub fn sample_index() -> DocumentationIndex {
    DocumentationIndex::from_xml(SAMPLE_PDEF_XML, "sample.xml", VehicleType::ArduCopter, 100)
        .unwrap_or_else(|e| panic!("sample documentation must parse: {e}"))
}

/// Document source answering from a URL map and recording every request
#[derive(Debug, Default)]
pub struct InMemorySource {
    bodies: HashMap<String, String>,
    requested: RefCell<Vec<String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl DocumentSource for InMemorySource {
    fn get(&self, url: &str) -> Result<String, SourceError> {
        self.requested.borrow_mut().push(url.to_string());
        self.bodies.get(url).cloned().ok_or_else(|| SourceError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Temporary vehicle directory holding parameter files
pub struct VehicleDir {
    dir: tempfile::TempDir,
}

impl VehicleDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}")),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {name}: {e}"));
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name))
            .unwrap_or_else(|e| panic!("read {name}: {e}"))
    }

    pub fn with_pdef(self) -> Self {
        self.write(apm_docs::PARAM_DEFINITION_XML_FILE, SAMPLE_PDEF_XML);
        self
    }
}

impl Default for VehicleDir {
    fn default() -> Self {
        Self::new()
    }
}

pub fn params(entries: &[(&str, f64)]) -> apm_params::ParameterSet {
    entries
        .iter()
        .map(|(name, value)| (*name, apm_params::ParameterRecord::from_value(*value)))
        .collect()
}
