//! Device catalog data model and aggregation
//!
//! A [`Catalog`] groups the flat device list returned by the registry by
//! device type. Groups keep the order in which their type first appeared and
//! devices keep registry order within a group, so aggregating the same input
//! twice always produces the same catalog.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::{CatalogError, Result};

/// A single device as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub identifier: String,
}

impl DeviceRecord {
    pub fn new(
        name: impl Into<String>,
        device_type: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            identifier: identifier.into(),
        }
    }
}

/// All devices of one type
///
/// Every name in `devices` has an entry in `name_to_identifier` and no name
/// appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceGroup {
    label: String,
    devices: Vec<String>,
    selected: Option<String>,
    name_to_identifier: BTreeMap<String, String>,
}

impl DeviceGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            devices: Vec::new(),
            selected: None,
            name_to_identifier: BTreeMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Device names in registry order
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn name_to_identifier(&self) -> &BTreeMap<String, String> {
        &self.name_to_identifier
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_identifier.contains_key(name)
    }

    pub fn identifier_for(&self, name: &str) -> Option<&str> {
        self.name_to_identifier.get(name).map(String::as_str)
    }

    /// Identifier of the selected device, if any
    pub fn selected_identifier(&self) -> Option<&str> {
        self.selected
            .as_deref()
            .and_then(|name| self.identifier_for(name))
    }

    /// Mark a known device as selected
    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(CatalogError::UnknownDevice(format!(
                "'{}' is not a '{}' device",
                name, self.label
            )));
        }
        self.selected = Some(name.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Add a device; a repeated name only updates its identifier
    fn insert(&mut self, name: &str, identifier: &str) {
        if !self.contains(name) {
            self.devices.push(name.to_string());
        }
        self.name_to_identifier
            .insert(name.to_string(), identifier.to_string());
    }
}

/// Device groups keyed by device type, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    groups: Vec<DeviceGroup>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_type: &str) -> Option<&DeviceGroup> {
        self.groups.iter().find(|g| g.label == device_type)
    }

    pub fn get_mut(&mut self, device_type: &str) -> Option<&mut DeviceGroup> {
        self.groups.iter_mut().find(|g| g.label == device_type)
    }

    pub fn groups(&self) -> &[DeviceGroup] {
        &self.groups
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.label.as_str())
    }

    /// Number of device types
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct devices across all types
    pub fn device_count(&self) -> usize {
        self.groups.iter().map(|g| g.devices.len()).sum()
    }

    pub fn identifier_for(&self, device_type: &str, name: &str) -> Option<&str> {
        self.get(device_type)
            .and_then(|group| group.identifier_for(name))
    }

    fn group_entry(&mut self, device_type: &str) -> &mut DeviceGroup {
        let index = match self.groups.iter().position(|g| g.label == device_type) {
            Some(index) => index,
            None => {
                self.groups.push(DeviceGroup::new(device_type));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.label, group)?;
        }
        map.end()
    }
}

/// Group device records by type
pub fn aggregate<'a, I>(records: I) -> Catalog
where
    I: IntoIterator<Item = &'a DeviceRecord>,
{
    let mut catalog = Catalog::new();
    for record in records {
        catalog
            .group_entry(&record.device_type)
            .insert(&record.name, &record.identifier);
    }
    catalog
}
