//! Error types.
//!
//! Only configuration can fail. Once an engine exists, every runtime
//! situation (non-numeric results, updates from foreign elements) is handled
//! by policy and never surfaces as an error.

use thiserror::Error;

use crate::engine::Target;

/// Errors raised while building an engine or loading a form manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The calculations form a dependency cycle.
    #[error("calculation cycle: {}", format_path(.path))]
    Cycle {
        /// The targets on the cycle, first target repeated at the end.
        path: Vec<Target>,
    },

    /// A calculation lists its own output among its inputs.
    #[error("calculation {name} reads its own output {target}")]
    SelfDependency { name: String, target: Target },

    /// A manifest references a function missing from the function table.
    #[error("unknown calculation function: {0}")]
    UnknownFunction(String),

    /// The manifest is not valid JSON for the expected shape.
    #[error(transparent)]
    Manifest(#[from] serde_json::Error),
}

fn format_path(path: &[Target]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
