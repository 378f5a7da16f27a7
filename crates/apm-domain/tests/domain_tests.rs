//! Property and scenario tests for the parameter domain model

use apm_docs::DocumentationEntry;
use apm_domain::{ArduPilotParameter, BitLabels, BitmaskHelper, Lock, ParameterError};
use apm_params::ParameterRecord;
use proptest::prelude::*;

fn bitmask_entry(field: &str) -> DocumentationEntry {
    let mut entry = DocumentationEntry::default();
    entry.fields.insert("Bitmask".to_string(), field.to_string());
    entry
}

fn labels_strategy() -> impl Strategy<Value = BitLabels> {
    prop::collection::btree_map(0u32..64, "[A-Za-z]{1,8}", 1..16)
}

proptest! {
    #[test]
    fn checked_keys_round_trip(labels in labels_strategy(), selector in any::<u64>()) {
        let value = selector & BitmaskHelper::allowed_mask(&labels);
        let keys = BitmaskHelper::checked_keys(value, &labels);
        prop_assert_eq!(BitmaskHelper::value_from_keys(keys), value);
    }

    #[test]
    fn zero_has_no_checked_keys(labels in labels_strategy()) {
        prop_assert!(BitmaskHelper::checked_keys(0, &labels).is_empty());
    }

    #[test]
    fn bitmask_field_round_trip(labels in labels_strategy()) {
        let field = labels
            .iter()
            .map(|(bit, label)| format!("{bit}:{label}"))
            .collect::<Vec<_>>()
            .join(",");
        prop_assert_eq!(BitmaskHelper::parse_field(&field), labels);
    }

    #[test]
    fn forced_parameter_rejects_every_input(text in ".*", ignore in any::<bool>()) {
        let mut p = ArduPilotParameter::new("PARAM1", &ParameterRecord::from_value(1.0))
            .with_forced(Some(ParameterRecord::new(2.0, Some("pinned".to_string()))));
        let err = p.set_new_value(&text, ignore).unwrap_err();
        prop_assert_eq!(
            err,
            ParameterError::NotEditable { name: "PARAM1".to_string(), lock: Lock::Forced }
        );
        prop_assert_eq!(p.new_value(), 2.0);
    }

    #[test]
    fn in_range_values_are_accepted(v in 0.0f64..1.0) {
        let mut entry = DocumentationEntry::default();
        entry.fields.insert("Range".to_string(), "0 1".to_string());
        let mut p = ArduPilotParameter::new("PARAM1", &ParameterRecord::from_value(5.0))
            .with_metadata(entry);
        prop_assert_eq!(p.set_new_value(&v.to_string(), false), Ok(v));
    }
}

#[test]
fn bitmask_edit_through_checked_bits() {
    let entry = bitmask_entry("0:Roll,1:Pitch,2:Yaw");
    let mut p =
        ArduPilotParameter::new("ATC_MASK", &ParameterRecord::from_value(0.0)).with_metadata(entry);

    assert_eq!(p.set_checked_bits([0, 2]).unwrap(), 5.0);
    let checked = BitmaskHelper::checked_keys(5, &p.bit_labels());
    assert_eq!(checked.into_iter().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(p.to_record().value(), 5.0);
}
