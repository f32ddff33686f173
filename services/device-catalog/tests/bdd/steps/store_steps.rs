//! BDD step definitions for catalog store synchronization

use std::sync::Arc;

use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use device_catalog::{CatalogError, CatalogStore, LoadState};

use super::records_from_table;
use crate::world::{CatalogWorld, ScriptedRegistry};

fn parse_load_state(s: &str) -> LoadState {
    match s {
        "idle" => LoadState::Idle,
        "loading" => LoadState::Loading,
        "ready" => LoadState::Ready,
        "failed" => LoadState::Failed,
        other => panic!("Unknown load state: {}", other),
    }
}

fn error_for(kind: &str) -> CatalogError {
    match kind {
        "network" => CatalogError::Network("connection refused".to_string()),
        "malformed response" => {
            CatalogError::MalformedResponse("'result' is not an array".to_string())
        }
        other => panic!("Unknown error kind: {}", other),
    }
}

fn install(world: &mut CatalogWorld, registry: ScriptedRegistry) {
    let registry = Arc::new(registry);
    world.store = Some(CatalogStore::new(registry.clone()));
    world.registry = Some(registry);
}

#[given("a registry that lists the following devices:")]
fn registry_with_devices(world: &mut CatalogWorld, step: &Step) {
    install(world, ScriptedRegistry::new(Ok(records_from_table(step))));
}

#[given("a registry that fails with a malformed response")]
fn registry_malformed(world: &mut CatalogWorld) {
    install(
        world,
        ScriptedRegistry::new(Err(error_for("malformed response"))),
    );
}

#[given("the catalog has been loaded")]
async fn catalog_loaded(world: &mut CatalogWorld) {
    world.store().initialize().await.expect("initial load failed");
}

#[when(expr = "the registry starts failing with a {word} error")]
fn registry_starts_failing(world: &mut CatalogWorld, kind: String) {
    world.registry().respond_with(Err(error_for(&kind)));
}

#[when("the registry starts listing the following devices:")]
fn registry_starts_listing(world: &mut CatalogWorld, step: &Step) {
    world.registry().respond_with(Ok(records_from_table(step)));
}

#[given("a consumer has initialized the catalog")]
async fn consumer_has_initialized(world: &mut CatalogWorld) {
    let result = world.store().initialize().await;
    world.results.push(result);
}

#[when("a consumer initializes the catalog")]
async fn consumer_initializes(world: &mut CatalogWorld) {
    let result = world.store().initialize().await;
    world.results.push(result);
}

#[when(expr = "{int} consumers initialize the catalog at the same time")]
async fn consumers_initialize(world: &mut CatalogWorld, count: usize) {
    let handles: Vec<_> = (0..count)
        .map(|_| {
            let store = world.store().clone();
            tokio::spawn(async move { store.initialize().await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.expect("consumer task panicked");
        world.results.push(result);
    }
}

#[then(expr = "the registry was queried {int} time(s)")]
fn registry_queried(world: &mut CatalogWorld, expected: u32) {
    assert_eq!(world.registry().calls(), expected);
}

#[then("every consumer succeeded")]
fn every_consumer_succeeded(world: &mut CatalogWorld) {
    assert!(!world.results.is_empty());
    for result in &world.results {
        assert_eq!(result, &Ok(()));
    }
}

#[then(expr = "the last consumer failed with a {word} error")]
fn last_consumer_failed(world: &mut CatalogWorld, kind: String) {
    let last = world.results.last().expect("no consumer ran");
    assert_eq!(last, &Err(error_for(&kind)));
}

#[then(expr = "the catalog state is {string}")]
fn catalog_state_is(world: &mut CatalogWorld, state: String) {
    assert_eq!(world.store().load_state(), parse_load_state(&state));
}

#[then("the published catalog is empty")]
fn published_catalog_empty(world: &mut CatalogWorld) {
    assert!(world.store().catalog().is_empty());
}

#[then(expr = "the published catalog maps {string} {string} to {string}")]
fn published_catalog_maps(
    world: &mut CatalogWorld,
    device_type: String,
    name: String,
    identifier: String,
) {
    let catalog = world.store().catalog();
    assert_eq!(
        catalog.identifier_for(&device_type, &name),
        Some(identifier.as_str())
    );
}
