//! Bitmask parameter helpers
//!
//! A `Bitmask` documentation field lists `bit:label` pairs, e.g.
//! `0:Roll,1:Pitch,2:Yaw`. Values are integers whose set bits select labels.

use std::collections::{BTreeMap, BTreeSet};

/// Bit number → label
pub type BitLabels = BTreeMap<u32, String>;

/// Conversions between bitmask values and bit numbers
#[derive(Debug, Clone, Copy, Default)]
pub struct BitmaskHelper;

impl BitmaskHelper {
    /// Parse a `Bitmask` documentation field
    ///
    /// Malformed pairs and bits beyond 63 are skipped.
    #[must_use]
    pub fn parse_field(field: &str) -> BitLabels {
        field
            .split(',')
            .filter_map(|pair| {
                let (bit, label) = pair.split_once(':')?;
                let bit: u32 = bit.trim().parse().ok()?;
                (bit < u64::BITS).then(|| (bit, label.trim().to_string()))
            })
            .collect()
    }

    /// Documented bits that are set in `value`
    #[must_use]
    pub fn checked_keys(value: u64, labels: &BitLabels) -> BTreeSet<u32> {
        labels
            .keys()
            .copied()
            .filter(|&bit| value & (1 << bit) != 0)
            .collect()
    }

    /// Value with exactly the given bits set
    #[must_use]
    pub fn value_from_keys(keys: impl IntoIterator<Item = u32>) -> u64 {
        keys.into_iter()
            .filter(|&bit| bit < u64::BITS)
            .fold(0, |acc, bit| acc | (1 << bit))
    }

    /// Mask of all documented bits
    #[inline]
    #[must_use]
    pub fn allowed_mask(labels: &BitLabels) -> u64 {
        Self::value_from_keys(labels.keys().copied())
    }

    /// Bits of `value` that are not documented; every bit for negative values
    #[must_use]
    pub fn disallowed_bits(value: i64, labels: &BitLabels) -> u64 {
        match u64::try_from(value) {
            Ok(v) => v & !Self::allowed_mask(labels),
            Err(_) => u64::MAX,
        }
    }

    /// Label lookup by bit number
    #[must_use]
    pub fn bit_for_label(label: &str, labels: &BitLabels) -> Option<u32> {
        labels
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(bit, _)| *bit)
    }
}

/// Parse an integer with an optional sign and `0x`, `0o` or `0b` radix prefix
#[must_use]
pub fn parse_int_auto_radix(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (8, oct)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, lower.as_str())
    };
    let body = body.replace('_', "");
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i64::from_str_radix(&body, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
