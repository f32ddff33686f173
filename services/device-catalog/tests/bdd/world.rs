//! BDD test world for the device catalog service

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cucumber::World;
use device_catalog::{Catalog, CatalogStore, DeviceRecord, DeviceRegistry};

/// Registry whose next answer is set by the scenario
#[derive(Debug)]
pub struct ScriptedRegistry {
    calls: AtomicU32,
    response: Mutex<device_catalog::Result<Vec<DeviceRecord>>>,
}

impl ScriptedRegistry {
    pub fn new(response: device_catalog::Result<Vec<DeviceRecord>>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            response: Mutex::new(response),
        }
    }

    pub fn respond_with(&self, response: device_catalog::Result<Vec<DeviceRecord>>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceRegistry for ScriptedRegistry {
    async fn fetch_devices(&self) -> device_catalog::Result<Vec<DeviceRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }
}

#[derive(Debug, Default, World)]
pub struct CatalogWorld {
    // Aggregation
    pub records: Vec<DeviceRecord>,
    pub catalog: Option<Catalog>,

    // Store synchronization
    pub registry: Option<Arc<ScriptedRegistry>>,
    pub store: Option<CatalogStore>,
    pub results: Vec<device_catalog::Result<()>>,
}

impl CatalogWorld {
    pub fn registry(&self) -> &Arc<ScriptedRegistry> {
        self.registry.as_ref().expect("registry not set")
    }

    pub fn store(&self) -> &CatalogStore {
        self.store.as_ref().expect("store not set")
    }
}
