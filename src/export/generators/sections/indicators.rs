//! Flat check/quantity markers: indicators, TRL level and checkbox groups.

use std::collections::BTreeMap;

use crate::export::generators::common::format_quantity;
use crate::export::model::Indicator;

/// Value of a ticked check marker.
pub const CHECKED: &str = "X";
/// Value of an unticked check marker; keeps the box width in the template.
pub const UNCHECKED: &str = "  ";

pub const MAX_TRL: u8 = 9;

fn check(flag: bool) -> String {
    let value = if flag { CHECKED } else { UNCHECKED };
    value.to_string()
}

/// `<key>_check` and `<key>_qty` for every indicator.
pub fn indicator_markers(indicators: &BTreeMap<String, Indicator>) -> BTreeMap<String, String> {
    let mut markers = BTreeMap::new();
    for (key, indicator) in indicators {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        markers.insert(format!("{}_check", key), check(indicator.enabled));
        let quantity = if indicator.enabled && indicator.quantity > 0.0 {
            format_quantity(indicator.quantity)
        } else {
            String::new()
        };
        markers.insert(format!("{}_qty", key), quantity);
    }
    markers
}

/// `trl1_check` ..= `trl9_check`, ticking only the selected level.
pub fn trl_markers(level: Option<u8>) -> BTreeMap<String, String> {
    (1..=MAX_TRL)
        .map(|n| (format!("trl{}_check", n), check(level == Some(n))))
        .collect()
}

/// `<group>_<option>_check` for every selected checkbox option.
pub fn checkbox_markers(checkboxes: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, String> {
    let mut markers = BTreeMap::new();
    for (group, options) in checkboxes {
        for option in options {
            let option = option.trim();
            if option.is_empty() {
                continue;
            }
            markers.insert(format!("{}_{}_check", group.trim(), option), check(true));
        }
    }
    markers
}
