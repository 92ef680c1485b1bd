//! Formcalc Core
//!
//! This crate provides the recalculation engine for calculated forms.
//! It implements:
//!
//! - A value store of fields and variables per form
//! - Dependency-driven cascades of registered calculations
//! - Decimal-safe arithmetic helpers for calculation bodies
//! - A registry that broadcasts host change notifications to every form
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: Loosely typed form values and numeric coercion
//! - `decimal`: Shift-factor arithmetic that hides binary float artifacts
//! - `host`: The traits a host document implements, plus an in-memory host
//! - `graph`: Dependency graph, cycle detection and ordering
//! - `engine`: Value store, calculation descriptors and the cascade
//! - `config`: Engine configuration, formatting hooks and JSON manifests
//! - `registry`: Host-owned set of engines with change broadcasting
//!
//! # Example
//!
//! ```rust
//! use formcalc_core::{Calculation, EngineConfig, FormRegistry};
//! use formcalc_core::host::memory::MemoryContainer;
//!
//! let form = MemoryContainer::new();
//! let net = form.add_field("net", "100");
//! form.add_field("gross", "");
//!
//! let config = EngineConfig::new().with_calculation(
//!     Calculation::to_field("gross", |ctx| ctx.multiply(ctx.field("net"), 1.19))
//!         .reads_field("net"),
//! );
//!
//! let registry = FormRegistry::new();
//! registry.attach([form.clone()], &config).unwrap();
//! assert_eq!(form.value_of("gross").as_deref(), Some("119"));
//!
//! net.input("0.1");
//! registry.dispatch(&*net);
//! assert_eq!(form.value_of("gross").as_deref(), Some("0.119"));
//! ```

pub mod config;
pub mod decimal;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod registry;
pub mod value;

pub use config::{EngineConfig, EngineSettings, FormManifest, FunctionTable};
pub use engine::{Calculation, Engine, EngineContext, Target, ValueStore};
pub use error::ConfigError;
pub use host::{ChangeEvent, Container, FieldHandle};
pub use registry::{FormHandle, FormRegistry};
pub use value::Value;
