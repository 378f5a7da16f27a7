//! Configuration step processing over the sample documentation

use apm_domain::ParameterError;
use apm_params::{ParameterRecord, ParameterSet};
use apm_steps::{
    apply_edits, ConfigurationStepProcessor, ConfigurationSteps, StepError, Variables,
};
use apm_test_utils::{params, sample_index, VehicleDir};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

const STEPS: &str = r#"{
  "steps": {
    "08_batt1.param": {
      "forced_parameters": {
        "BATT_MONITOR": {"New Value": 4, "Change Reason": "Analog voltage and current"}
      },
      "derived_parameters": {
        "BATT_CAPACITY": {
          "New Value": "vehicle_components['Battery']['Specifications']['Capacity mAh']",
          "Change Reason": "Total battery capacity"
        }
      }
    },
    "12_can.param": {
      "derived_parameters": {
        "CAN_P2_DRIVER": {"New Value": "'First driver'", "Change Reason": "DroneCAN on port 2"}
      },
      "rename_connection": "vehicle_components['GNSS Receiver']['FC Connection']['Type']"
    },
    "20_imu.param": {
      "derived_parameters": {
        "INS_GYRO_FILTER": {"New Value": "fc_parameters['INS_GYRO_FILTER'] * 2", "Change Reason": "Faster filter"}
      }
    }
  }
}"#;

fn steps() -> ConfigurationSteps {
    ConfigurationSteps::from_json(STEPS, "configuration_steps_ArduCopter.json").unwrap()
}

fn components() -> Variables {
    Variables::new().with(
        "vehicle_components",
        serde_json::json!({
            "Battery": {"Specifications": {"Capacity mAh": 5000}},
            "GNSS Receiver": {"FC Connection": {"Type": "CAN2"}}
        }),
    )
}

fn fc(entries: &[(&str, f64)]) -> IndexMap<String, f64> {
    entries.iter().map(|(n, v)| ((*n).to_string(), *v)).collect()
}

fn processor() -> ConfigurationStepProcessor {
    let defaults = params(&[("BATT_CAPACITY", 3300.0), ("BATT_MONITOR", 0.0)]);
    ConfigurationStepProcessor::new(sample_index(), defaults)
        .with_fc_parameters(fc(&[
            ("BATT_CAPACITY", 3300.0),
            ("BATT_MONITOR", 0.0),
            ("CAN_P2_DRIVER", 0.0),
            ("CAN_D2_PROTOCOL", 0.0),
            ("INS_GYRO_FILTER", 40.0),
        ]))
}

#[test]
fn battery_step_locks_forced_and_derived_values() {
    let steps = steps();
    let record = ParameterRecord::new(3300.0, Some("old pack".to_string()));
    let mut file: ParameterSet = [("BATT_CAPACITY", record)].into_iter().collect();

    let outcome = processor()
        .process_step("08_batt1.param", &mut file, &steps.steps["08_batt1.param"], &components())
        .unwrap();

    assert_eq!(outcome.added, vec!["BATT_MONITOR".to_string()]);
    assert_eq!(outcome.feedback.len(), 1);
    assert_eq!(outcome.feedback[0].title, "Parameter Added");
    assert!(file.contains("BATT_MONITOR"));

    let capacity = &outcome.parameters["BATT_CAPACITY"];
    assert!(capacity.is_derived());
    assert_eq!(capacity.new_value(), 5000.0);
    assert_eq!(capacity.change_reason(), Some("Total battery capacity"));
    assert_eq!(capacity.value_on_file(), 3300.0);
    assert!(capacity.is_dirty());
    assert_eq!(capacity.unit(), Some("mAh (milliampere hour)"));

    let monitor = &outcome.parameters["BATT_MONITOR"];
    assert!(monitor.is_forced());
    assert!(!monitor.is_derived());
    assert!(monitor.is_different_from_fc());
    assert_eq!(monitor.default_value(), Some(0.0));
    assert!(matches!(
        monitor.clone().set_new_value("3", false),
        Err(ParameterError::NotEditable { .. })
    ));
}

#[test]
fn can_step_renames_then_derives() {
    let steps = steps();
    let mut file = params(&[("CAN_P1_DRIVER", 1.0), ("CAN_D1_PROTOCOL", 1.0)]);

    let outcome = processor()
        .process_step("12_can.param", &mut file, &steps.steps["12_can.param"], &components())
        .unwrap();

    assert_eq!(
        outcome.renamed,
        vec![
            ("CAN_P1_DRIVER".to_string(), "CAN_P2_DRIVER".to_string()),
            ("CAN_D1_PROTOCOL".to_string(), "CAN_D2_PROTOCOL".to_string()),
        ]
    );
    assert!(outcome.added.is_empty());
    assert_eq!(file.names().collect::<Vec<_>>(), vec!["CAN_P2_DRIVER", "CAN_D2_PROTOCOL"]);

    let driver = &outcome.parameters["CAN_P2_DRIVER"];
    assert!(driver.is_derived());
    assert_eq!(driver.new_value(), 1.0);
    assert!(driver.is_multiple_choice());
    assert!(outcome.feedback.iter().any(|f| {
        f.title == "Parameter Renamed"
            && f.message.contains("'CAN_D1_PROTOCOL' to 'CAN_D2_PROTOCOL'")
    }));
}

#[test]
fn failing_expression_leaves_the_file_untouched() {
    let steps = steps();
    let mut file = params(&[("BATT_CAPACITY", 3300.0)]);
    let before = file.clone();

    let err = processor()
        .process_step(
            "08_batt1.param",
            &mut file,
            &steps.steps["08_batt1.param"],
            &Variables::new(),
        )
        .unwrap_err();

    assert!(matches!(err, StepError::Evaluation { ref file, .. } if file == "08_batt1.param"));
    assert!(err.to_string().contains("'BATT_CAPACITY' derived parameter"), "{err}");
    assert_eq!(file, before);
}

#[test]
fn flight_controller_values_need_a_connection() {
    let steps = steps();
    let step = &steps.steps["20_imu.param"];

    let disconnected = ConfigurationStepProcessor::new(sample_index(), ParameterSet::new());
    let err = disconnected
        .process_step("20_imu.param", &mut ParameterSet::new(), step, &components())
        .unwrap_err();
    assert!(err.to_string().ends_with("is the flight controller connected?"), "{err}");

    let mut file = ParameterSet::new();
    let outcome = processor().process_step("20_imu.param", &mut file, step, &components()).unwrap();
    assert_eq!(outcome.added, vec!["INS_GYRO_FILTER".to_string()]);
    assert_eq!(outcome.parameters["INS_GYRO_FILTER"].new_value(), 80.0);
}

#[test]
fn user_edits_are_written_back() {
    let dir = VehicleDir::new();
    let path = dir.write("05_compass.param", "COMPASS_DISBLMSK,0\nPARAM1,0.5 # tuned\n");
    let mut file = ParameterSet::from_file(&path).unwrap();

    let processor = ConfigurationStepProcessor::new(sample_index(), ParameterSet::new());
    let mut outcome = processor
        .process_step("05_compass.param", &mut file, &Default::default(), &Variables::new())
        .unwrap();

    let mask = outcome.parameters.get_mut("COMPASS_DISBLMSK").unwrap();
    assert!(mask.is_bitmask());
    assert_eq!(mask.set_checked_bits([0, 3]).unwrap(), 9.0);

    let ranged = outcome.parameters.get_mut("PARAM1").unwrap();
    assert!(ranged.set_new_value("2", false).unwrap_err().is_out_of_range());
    assert_eq!(ranged.set_new_value("2", true).unwrap(), 2.0);

    assert_eq!(apply_edits(&mut file, outcome.parameters.values()), 2);
    assert_eq!(file.get("COMPASS_DISBLMSK").unwrap().value(), 9.0);
    assert_eq!(file.get("PARAM1").unwrap().comment(), Some("tuned"));
}
