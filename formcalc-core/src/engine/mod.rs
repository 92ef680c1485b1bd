//! Recalculation Engine
//!
//! This module implements the core of the crate: the value store, the
//! calculation descriptors, and the cascade that re-runs calculations when
//! their inputs change.
//!
//! # Concepts
//!
//! ## Fields and Variables
//!
//! A field is a value slot backed by a host element; the user can see it and
//! usually edit it. A variable is a value slot with no element, used for
//! intermediate results. Both live in the [`ValueStore`] and are addressed by
//! a [`Target`].
//!
//! ## Calculations
//!
//! A [`Calculation`] reads any number of fields and variables and writes
//! exactly one target. Its body receives an [`EngineContext`] with read
//! access to the store and the decimal helpers.
//!
//! ## Cascade
//!
//! When a target changes, every calculation reading it runs in registration
//! order. Each numeric result is stored and becomes the trigger for the next
//! round, so chains like `net -> vat -> gross` settle within a single
//! [`Engine::update`] call. A result that is not a number ends its branch
//! without touching the store.

mod calculation;
mod context;
mod runtime;
mod store;

pub use calculation::{CalculateFn, Calculation, Target};
pub use context::EngineContext;
pub use runtime::{Engine, EngineId};
pub use store::ValueStore;
