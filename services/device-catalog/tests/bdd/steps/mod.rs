//! BDD step definitions for the device catalog service

pub mod aggregation_steps;
pub mod store_steps;

use cucumber::gherkin::Step;
use device_catalog::DeviceRecord;

/// Read a `| name | type | identifier |` table from a step
pub fn records_from_table(step: &Step) -> Vec<DeviceRecord> {
    let table = step.table.as_ref().expect("step has no table");
    table
        .rows
        .iter()
        .skip(1)
        .map(|row| DeviceRecord::new(row[0].as_str(), row[1].as_str(), row[2].as_str()))
        .collect()
}

/// Split a comma separated list, ignoring blanks
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
