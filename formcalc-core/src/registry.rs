//! Form Registry
//!
//! The registry is the host-facing entry point. It owns the engines of a page
//! or session and fans change notifications out to them.
//!
//! # How It Works
//!
//! 1. [`FormRegistry::attach`] builds one engine per container from a shared
//!    configuration and registers them in order.
//!
//! 2. The host forwards every change notification to
//!    [`FormRegistry::process_change`]. Each engine decides for itself whether
//!    the element belongs to its container, so a single feed serves any number
//!    of independent forms.
//!
//! 3. Engines stay registered until [`FormRegistry::unregister`] removes
//!    them. The registry is owned by the host; dropping it drops every engine
//!    that no [`FormHandle`] still holds.
//!
//! # Thread Safety
//!
//! Engines sit behind a `parking_lot::Mutex` and the engine list behind a
//! `RwLock`. Dispatch clones the list and releases the list lock before any
//! cascade runs, so registering or unregistering engines during a dispatch
//! does not block.
//!
//! An engine's mutex is held for its whole cascade, including the
//! [`FieldHandle::set_value`] write-backs. The mutex is not reentrant: a host
//! that raises a change synchronously from `set_value`, or a calculation
//! that dispatches into its own form, deadlocks. Queue such changes and
//! dispatch them after the current call returns.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineId};
use crate::error::ConfigError;
use crate::host::{ChangeEvent, Container, FieldHandle};

/// An engine shared between the registry and handles.
pub type SharedEngine = Arc<Mutex<Engine>>;

type Entry = (EngineId, SharedEngine);

/// An explicit, host-owned registry of engines.
#[derive(Default)]
pub struct FormRegistry {
    engines: RwLock<Vec<Entry>>,
}

impl FormRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine at the end of the dispatch order.
    pub fn register(&self, engine: Engine) -> EngineId {
        self.insert(Arc::new(Mutex::new(engine)))
    }

    fn insert(&self, engine: SharedEngine) -> EngineId {
        let id = engine.lock().id();
        self.engines.write().push((id, engine));
        debug!(engine = %id, "engine registered");
        id
    }

    /// Remove an engine. Returns it if it was registered.
    pub fn unregister(&self, id: EngineId) -> Option<SharedEngine> {
        let mut engines = self.engines.write();
        let position = engines.iter().position(|(entry, _)| *entry == id)?;
        let (_, engine) = engines.remove(position);
        debug!(engine = %id, "engine unregistered");
        Some(engine)
    }

    /// Build and register one engine per container.
    ///
    /// Every engine gets its own copy of `config`. If any engine fails to
    /// build, nothing is registered.
    pub fn attach<C, I>(&self, containers: I, config: &EngineConfig) -> Result<FormHandle, ConfigError>
    where
        C: Container + 'static,
        I: IntoIterator<Item = Arc<C>>,
    {
        let engines = containers
            .into_iter()
            .map(|container| Engine::new(container, config.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let entries: Vec<Entry> = engines
            .into_iter()
            .map(|engine| {
                let shared = Arc::new(Mutex::new(engine));
                (self.insert(Arc::clone(&shared)), shared)
            })
            .collect();

        info!(engines = entries.len(), "forms attached");
        Ok(FormHandle { engines: entries })
    }

    /// Build and register an engine for a single container.
    pub fn attach_one(
        &self,
        container: Arc<dyn Container>,
        config: &EngineConfig,
    ) -> Result<FormHandle, ConfigError> {
        let shared = Arc::new(Mutex::new(Engine::new(container, config.clone())?));
        let id = self.insert(Arc::clone(&shared));
        Ok(FormHandle {
            engines: vec![(id, shared)],
        })
    }

    /// Forward a changed element to every registered engine.
    ///
    /// Returns the number of engines that accepted the change.
    pub fn dispatch(&self, element: &dyn FieldHandle) -> usize {
        let engines = self.engines.read().clone();
        let accepted = update_all(&engines, element);
        debug!(
            element = %element.id(),
            engines = engines.len(),
            accepted,
            "change dispatched"
        );
        accepted
    }

    /// Forward a change notification to every registered engine.
    pub fn process_change(&self, event: &ChangeEvent) -> usize {
        self.dispatch(&*event.target)
    }

    /// Get a registered engine.
    pub fn get(&self, id: EngineId) -> Option<SharedEngine> {
        self.engines
            .read()
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, engine)| Arc::clone(engine))
    }

    /// Run `f` with exclusive access to a registered engine.
    pub fn with_engine<R>(&self, id: EngineId, f: impl FnOnce(&mut Engine) -> R) -> Option<R> {
        let engine = self.get(id)?;
        let mut guard = engine.lock();
        Some(f(&mut guard))
    }

    /// IDs of all registered engines, in dispatch order.
    pub fn ids(&self) -> Vec<EngineId> {
        self.engines.read().iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }
}

impl fmt::Debug for FormRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRegistry")
            .field("engines", &self.ids())
            .finish()
    }
}

/// The engines created by one [`FormRegistry::attach`] call.
///
/// Updating through a handle only reaches its own engines.
#[derive(Clone)]
pub struct FormHandle {
    engines: Vec<Entry>,
}

impl FormHandle {
    /// Forward a changed element to this handle's engines.
    ///
    /// Returns the number of engines that accepted the change.
    pub fn update(&self, element: &dyn FieldHandle) -> usize {
        update_all(&self.engines, element)
    }

    pub fn ids(&self) -> Vec<EngineId> {
        self.engines.iter().map(|(id, _)| *id).collect()
    }

    pub fn engines(&self) -> impl Iterator<Item = &SharedEngine> {
        self.engines.iter().map(|(_, engine)| engine)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl fmt::Debug for FormHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormHandle")
            .field("engines", &self.ids())
            .finish()
    }
}

fn update_all(engines: &[Entry], element: &dyn FieldHandle) -> usize {
    engines
        .iter()
        .filter(|(_, engine)| engine.lock().update(element))
        .count()
}
