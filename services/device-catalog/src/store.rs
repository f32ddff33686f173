//! Catalog store: the published device catalog and its load protocol
//!
//! The store holds the current [`CatalogSnapshot`] and hands it to observers
//! on every publish. [`CatalogStore::initialize`] coalesces concurrent calls:
//! while a load is in flight every caller joins it instead of starting a new
//! registry fetch, and every caller receives the same outcome.
//!
//! Locks are always taken in the order `in_flight` then `observers`, and no
//! lock is held while an observer runs.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::catalog::{aggregate, Catalog};
use crate::registry::DeviceRegistry;
use crate::{CatalogError, Result};

/// Where the store is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Idle => write!(f, "Idle"),
            LoadState::Loading => write!(f, "Loading"),
            LoadState::Ready => write!(f, "Ready"),
            LoadState::Failed => write!(f, "Failed"),
        }
    }
}

/// The value published to observers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub catalog: Arc<Catalog>,
    pub load_state: LoadState,
}

type Observer = Arc<dyn Fn(&CatalogSnapshot) + Send + Sync>;
type LoadOutcome = Option<Result<()>>;

struct Registered {
    /// First publish sequence number this observer receives
    first_seq: u64,
    observer: Observer,
}

/// A staged snapshot waiting to be handed to observers
struct Delivery {
    seq: u64,
    snapshot: CatalogSnapshot,
    /// `Some` for the replay sent to a newly registered observer
    target: Option<u64>,
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    next_seq: u64,
    entries: BTreeMap<u64, Registered>,
    pending: VecDeque<Delivery>,
    draining: bool,
}

struct InFlight {
    generation: u64,
    outcome: watch::Receiver<LoadOutcome>,
}

#[derive(Default)]
struct InFlightSlot {
    next_generation: u64,
    current: Option<InFlight>,
}

struct Inner {
    registry: Arc<dyn DeviceRegistry>,
    state: watch::Sender<CatalogSnapshot>,
    observers: Mutex<Observers>,
    in_flight: Mutex<InFlightSlot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Replace the published snapshot and queue it for observers
    ///
    /// Callers that hold `in_flight` must call [`Inner::deliver`] after
    /// releasing it.
    fn stage(&self, snapshot: CatalogSnapshot) {
        let mut observers = lock(&self.observers);
        self.state.send_replace(snapshot.clone());
        let seq = observers.next_seq;
        observers.next_seq += 1;
        observers.pending.push_back(Delivery {
            seq,
            snapshot,
            target: None,
        });
    }

    /// Hand queued snapshots to observers, in staging order
    ///
    /// Only one thread drains at a time. A publish made while draining,
    /// including one made by an observer, is picked up by the drainer.
    fn deliver(&self) {
        {
            let mut observers = lock(&self.observers);
            if observers.draining {
                return;
            }
            observers.draining = true;
        }
        let _reset = DrainReset(self);

        loop {
            let (delivery, targets) = {
                let mut observers = lock(&self.observers);
                let Some(delivery) = observers.pending.pop_front() else {
                    observers.draining = false;
                    return;
                };
                let targets: Vec<Observer> = observers
                    .entries
                    .iter()
                    .filter(|(id, registered)| match delivery.target {
                        Some(target) => **id == target,
                        None => registered.first_seq <= delivery.seq,
                    })
                    .map(|(_, registered)| Arc::clone(&registered.observer))
                    .collect();
                (delivery, targets)
            };
            for observer in targets {
                observer(&delivery.snapshot);
            }
        }
    }

    fn current(&self) -> CatalogSnapshot {
        self.state.borrow().clone()
    }

    /// Publish the terminal state of load `generation` and release its slot
    fn complete(&self, generation: u64, mut catalog: Catalog, load_state: LoadState) {
        {
            let mut slot = lock(&self.in_flight);
            if slot.current.as_ref().map(|f| f.generation) != Some(generation) {
                return;
            }
            if load_state == LoadState::Ready {
                carry_over_selections(&self.current().catalog, &mut catalog);
            }
            self.stage(CatalogSnapshot {
                catalog: Arc::new(catalog),
                load_state,
            });
            slot.current = None;
        }
        self.deliver();
    }
}

/// Releases the drain flag if an observer panics mid-delivery
struct DrainReset<'a>(&'a Inner);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(&self.0.observers).draining = false;
        }
    }
}

/// Owned by the load task. If the task ends without completing, dropping
/// the guard leaves the store `Failed` with an empty catalog before waiters
/// see the outcome channel close.
struct LoadGuard {
    inner: Arc<Inner>,
    generation: u64,
    done: watch::Sender<LoadOutcome>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.inner
            .complete(self.generation, Catalog::default(), LoadState::Failed);
    }
}

/// Handle to a registered observer; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.observers).entries.remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Process-wide device catalog with single-flight loading
///
/// Cloning is cheap and every clone shares the same state. A fresh store is
/// `Idle` with an empty catalog.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CatalogStore")
            .field("load_state", &snapshot.load_state)
            .field("device_types", &snapshot.catalog.len())
            .finish()
    }
}

impl CatalogStore {
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        let (state, _) = watch::channel(CatalogSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                registry,
                state,
                observers: Mutex::new(Observers::default()),
                in_flight: Mutex::new(InFlightSlot::default()),
            }),
        }
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.inner.current()
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.inner.state.borrow().catalog)
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.state.borrow().load_state
    }

    /// A watch receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<CatalogSnapshot> {
        self.inner.state.subscribe()
    }

    /// Register an observer
    ///
    /// The observer first receives the current snapshot and then every
    /// later publish, in publish order. Observers run without any store
    /// lock held and may call back into the store. When called from inside
    /// another observer, the replay arrives once that observer returns.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&CatalogSnapshot) + Send + Sync + 'static,
    {
        let id = {
            let mut observers = lock(&self.inner.observers);
            let id = observers.next_id;
            observers.next_id += 1;
            let seq = observers.next_seq;
            observers.next_seq += 1;

            observers.pending.push_back(Delivery {
                seq,
                snapshot: self.inner.current(),
                target: Some(id),
            });
            observers.entries.insert(
                id,
                Registered {
                    first_seq: seq + 1,
                    observer: Arc::new(observer),
                },
            );
            id
        };
        self.inner.deliver();

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Load the catalog from the registry
    ///
    /// Joins the in-flight load if there is one. The load itself runs on its
    /// own task and always finishes, even if every caller stops waiting.
    pub async fn initialize(&self) -> Result<()> {
        let mut outcome = self.join_or_start();

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(result) => result.clone(),
            Err(_) => None,
        };
        result.unwrap_or_else(|| {
            Err(CatalogError::LoadAborted(
                "load task ended without reporting an outcome".to_string(),
            ))
        })
    }

    /// True while a load is in flight
    pub fn is_loading(&self) -> bool {
        self.load_state() == LoadState::Loading
    }

    /// Mark `name` as the selected device of `device_type`
    pub fn select_device(&self, device_type: &str, name: &str) -> Result<()> {
        self.update_group(device_type, |group| group.select(name))
    }

    pub fn clear_selection(&self, device_type: &str) -> Result<()> {
        self.update_group(device_type, |group| {
            group.clear_selection();
            Ok(())
        })
    }

    fn update_group<F>(&self, device_type: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut crate::catalog::DeviceGroup) -> Result<()>,
    {
        {
            // Held so a completing load cannot publish between our read and write.
            let _slot = lock(&self.inner.in_flight);
            let snapshot = self.inner.current();

            let mut catalog = Catalog::clone(&snapshot.catalog);
            let group = catalog.get_mut(device_type).ok_or_else(|| {
                CatalogError::UnknownDevice(format!("no devices of type '{}'", device_type))
            })?;
            update(group)?;

            self.inner.stage(CatalogSnapshot {
                catalog: Arc::new(catalog),
                load_state: snapshot.load_state,
            });
        }
        self.inner.deliver();
        Ok(())
    }

    fn join_or_start(&self) -> watch::Receiver<LoadOutcome> {
        let outcome = self.start_or_clone_outcome();
        self.inner.deliver();
        outcome
    }

    fn start_or_clone_outcome(&self) -> watch::Receiver<LoadOutcome> {
        let mut slot = lock(&self.inner.in_flight);
        if let Some(in_flight) = &slot.current {
            tracing::debug!(
                "Catalog load {} already in flight, joining it",
                in_flight.generation
            );
            return in_flight.outcome.clone();
        }

        let generation = slot.next_generation;
        slot.next_generation += 1;
        let (done, outcome) = watch::channel(None);
        slot.current = Some(InFlight {
            generation,
            outcome: outcome.clone(),
        });

        let previous = self.inner.current();
        self.inner.stage(CatalogSnapshot {
            catalog: previous.catalog,
            load_state: LoadState::Loading,
        });

        tracing::debug!("Starting catalog load {}", generation);
        tokio::spawn(run_load(LoadGuard {
            inner: Arc::clone(&self.inner),
            generation,
            done,
        }));
        outcome
    }
}

async fn run_load(guard: LoadGuard) {
    let inner = Arc::clone(&guard.inner);
    let outcome = match inner.registry.fetch_devices().await {
        Ok(records) => {
            let catalog = aggregate(&records);
            tracing::info!(
                "Catalog loaded: {} devices in {} types",
                catalog.device_count(),
                catalog.len()
            );
            inner.complete(guard.generation, catalog, LoadState::Ready);
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Failed to load device catalog: {}", e);
            inner.complete(guard.generation, Catalog::default(), LoadState::Failed);
            Err(e)
        }
    };
    guard.done.send_replace(Some(outcome));
}

/// Keep a group's selection across reloads while the device still exists
fn carry_over_selections(previous: &Catalog, next: &mut Catalog) {
    for old in previous.groups() {
        let (Some(selected), Some(group)) = (old.selected(), next.get_mut(old.label())) else {
            continue;
        };
        if group.select(selected).is_err() {
            tracing::debug!(
                "Selected device '{}' of type '{}' is gone after reload",
                selected,
                old.label()
            );
        }
    }
}
