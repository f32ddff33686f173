//! BDD step definitions for catalog aggregation

use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use device_catalog::aggregate;

use super::{records_from_table, split_list};
use crate::world::CatalogWorld;

#[given("the registry lists the following devices:")]
fn registry_lists(world: &mut CatalogWorld, step: &Step) {
    world.records = records_from_table(step);
}

#[given("the registry lists no devices")]
fn registry_lists_nothing(world: &mut CatalogWorld) {
    world.records.clear();
}

#[when("the devices are aggregated")]
fn devices_aggregated(world: &mut CatalogWorld) {
    world.catalog = Some(aggregate(&world.records));
}

#[when("the devices are aggregated again")]
fn devices_aggregated_again(world: &mut CatalogWorld) {
    let again = aggregate(&world.records);
    let first = world.catalog.as_ref().expect("catalog not aggregated");
    assert_eq!(first, &again, "aggregation is not deterministic");
}

#[then(expr = "the catalog has device types {string}")]
fn catalog_has_types(world: &mut CatalogWorld, types: String) {
    let catalog = world.catalog.as_ref().expect("catalog not aggregated");
    let actual: Vec<String> = catalog.types().map(String::from).collect();
    assert_eq!(actual, split_list(&types));
}

#[then(expr = "the {string} group lists devices {string}")]
fn group_lists_devices(world: &mut CatalogWorld, device_type: String, devices: String) {
    let catalog = world.catalog.as_ref().expect("catalog not aggregated");
    let group = catalog
        .get(&device_type)
        .unwrap_or_else(|| panic!("no '{}' group", device_type));
    assert_eq!(group.devices(), split_list(&devices).as_slice());
}

#[then(expr = "the {string} group maps {string} to {string}")]
fn group_maps_identifier(
    world: &mut CatalogWorld,
    device_type: String,
    name: String,
    identifier: String,
) {
    let catalog = world.catalog.as_ref().expect("catalog not aggregated");
    assert_eq!(
        catalog.identifier_for(&device_type, &name),
        Some(identifier.as_str())
    );
}

#[then("the aggregated catalog is empty")]
fn aggregated_catalog_empty(world: &mut CatalogWorld) {
    let catalog = world.catalog.as_ref().expect("catalog not aggregated");
    assert!(catalog.is_empty());
}
