//! Backend registry: loads, caches, and activates one backend per system.
//!
//! Loading is single-flight. Concurrent `ensure_loaded` calls for the same
//! system share one in-flight load and all observe its outcome; a duplicate
//! request is neither dropped nor queued behind a second load.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use romcnv_core::types::SystemKey;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{BackendError, BackendResult};
use crate::source::BackendSource;
use crate::traits::{Backend, BackendFactory};

type LoadFlight = Shared<BoxFuture<'static, BackendResult<Arc<dyn Backend>>>>;

enum Slot {
    Ready(Arc<dyn Backend>),
    Loading { flight_id: u64, flight: LoadFlight },
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<SystemKey, Slot>,
    /// Systems whose last load failed, with the reason. Submission for
    /// these is disabled until a load succeeds.
    unavailable: HashMap<SystemKey, String>,
}

/// The backend the pipeline dispatches against.
#[derive(Debug, Clone)]
pub struct ActiveBackend {
    /// System of the active backend.
    pub system: SystemKey,
    /// The backend instance.
    pub backend: Arc<dyn Backend>,
}

/// Registry of loaded conversion backends.
pub struct BackendRegistry {
    sources: BTreeMap<SystemKey, BackendSource>,
    factory: Arc<dyn BackendFactory>,
    state: Mutex<RegistryState>,
    active: RwLock<Option<ActiveBackend>>,
    next_flight: AtomicU64,
}

impl BackendRegistry {
    /// Create a registry over the given units.
    pub fn new(
        sources: BTreeMap<SystemKey, BackendSource>,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            sources,
            factory,
            state: Mutex::new(RegistryState::default()),
            active: RwLock::new(None),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Configured systems, sorted.
    pub fn systems(&self) -> Vec<SystemKey> {
        self.sources.keys().cloned().collect()
    }

    /// The configured unit for a system.
    pub fn source(&self, system: &SystemKey) -> Option<&BackendSource> {
        self.sources.get(system)
    }

    /// Return the cached backend, loading it first if needed.
    ///
    /// Fails with [`BackendError::Unavailable`] when the unit is missing or
    /// cannot be instantiated. A failed load leaves no cache entry behind.
    pub async fn ensure_loaded(&self, system: &SystemKey) -> BackendResult<Arc<dyn Backend>> {
        let (flight_id, flight) = {
            let mut state = self.state.lock().await;
            match state.slots.get(system) {
                Some(Slot::Ready(backend)) => return Ok(Arc::clone(backend)),
                Some(Slot::Loading { flight_id, flight }) => {
                    debug!(system = %system, "Joining in-flight backend load");
                    (*flight_id, flight.clone())
                }
                None => {
                    let source = self.sources.get(system).cloned().ok_or_else(|| {
                        BackendError::UnknownSystem {
                            system: system.to_string(),
                        }
                    })?;
                    let flight_id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let flight = load(Arc::clone(&self.factory), source).boxed().shared();
                    state.slots.insert(
                        system.clone(),
                        Slot::Loading {
                            flight_id,
                            flight: flight.clone(),
                        },
                    );
                    (flight_id, flight)
                }
            }
        };

        let result = flight.await;

        let mut state = self.state.lock().await;
        let owns_slot = matches!(
            state.slots.get(system),
            Some(Slot::Loading { flight_id: id, .. }) if *id == flight_id
        );
        // A waiter of a superseded flight leaves slot and availability alone.
        if owns_slot {
            match &result {
                Ok(backend) => {
                    state
                        .slots
                        .insert(system.clone(), Slot::Ready(Arc::clone(backend)));
                    if state.unavailable.remove(system).is_some() {
                        info!(system = %system, "Backend available again");
                    }
                }
                Err(e) => {
                    state.slots.remove(system);
                    state.unavailable.insert(system.clone(), e.to_string());
                }
            }
        }

        result
    }

    /// Make a loaded backend the one the pipeline dispatches against.
    pub async fn set_active(&self, system: &SystemKey) -> BackendResult<()> {
        let state = self.state.lock().await;
        let backend = match state.slots.get(system) {
            Some(Slot::Ready(backend)) => Arc::clone(backend),
            _ => {
                return Err(BackendError::NotLoaded {
                    system: system.to_string(),
                });
            }
        };

        let mut active = self.active.write().await;
        let previous = active.replace(ActiveBackend {
            system: system.clone(),
            backend,
        });
        drop(state);

        match previous {
            Some(prev) if prev.system != *system => {
                info!(from = %prev.system, to = %system, "Switched active backend");
            }
            Some(_) => {}
            None => info!(system = %system, "Activated backend"),
        }
        Ok(())
    }

    /// Load (if needed) and activate a backend in one step.
    pub async fn activate(&self, system: &SystemKey) -> BackendResult<ActiveBackend> {
        let backend = self.ensure_loaded(system).await?;
        self.set_active(system).await?;
        Ok(ActiveBackend {
            system: system.clone(),
            backend,
        })
    }

    /// Snapshot of the active backend.
    pub async fn active(&self) -> Option<ActiveBackend> {
        self.active.read().await.clone()
    }

    /// Drop a cached backend and release its sandbox.
    pub async fn unload(&self, system: &SystemKey) -> bool {
        let mut state = self.state.lock().await;
        let backend = match state.slots.get(system) {
            Some(Slot::Ready(backend)) => Arc::clone(backend),
            _ => return false,
        };
        state.slots.remove(system);

        let mut active = self.active.write().await;
        if active.as_ref().is_some_and(|a| a.system == *system) {
            *active = None;
        }
        drop(active);
        drop(state);

        backend.dispose();
        info!(system = %system, "Unloaded backend");
        true
    }

    /// Whether jobs may be submitted for a system.
    pub async fn is_submittable(&self, system: &SystemKey) -> bool {
        self.sources.contains_key(system)
            && !self.state.lock().await.unavailable.contains_key(system)
    }

    /// Reason the last load for a system failed, if it did.
    pub async fn unavailable_reason(&self, system: &SystemKey) -> Option<String> {
        self.state.lock().await.unavailable.get(system).cloned()
    }

    /// Systems with a cached backend, sorted.
    pub async fn loaded_systems(&self) -> Vec<SystemKey> {
        let state = self.state.lock().await;
        let mut systems: Vec<SystemKey> = state
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(system, _)| system.clone())
            .collect();
        systems.sort();
        systems
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("systems", &self.sources.keys().collect::<Vec<_>>())
            .field("factory", &self.factory)
            .finish()
    }
}

async fn load(
    factory: Arc<dyn BackendFactory>,
    source: BackendSource,
) -> BackendResult<Arc<dyn Backend>> {
    let system = source.system.to_string();
    info!(
        system = %system,
        binary = %source.binary_name,
        script = ?source.script_name,
        "Loading conversion backend"
    );

    let loaded = async {
        factory.probe(&source).await?;
        factory.instantiate(&source).await
    }
    .await;

    match loaded {
        Ok(backend) => {
            info!(system = %system, "Conversion backend ready");
            Ok(backend)
        }
        Err(e) => {
            warn!(system = %system, error = %e, "Conversion backend unavailable");
            Err(match e {
                BackendError::Unavailable { .. } => e,
                other => BackendError::Unavailable {
                    system,
                    reason: other.to_string(),
                },
            })
        }
    }
}
