//! Engine Configuration
//!
//! An [`EngineConfig`] bundles everything an engine is built from: the
//! calculations, the two formatting hooks and the [`EngineSettings`].
//!
//! Forms can also be described declaratively. A [`FormManifest`] is parsed
//! from JSON and bound to code through a [`FunctionTable`]:
//!
//! ```json
//! {
//!   "settings": { "allow_cycles": false },
//!   "calculations": [
//!     {
//!       "name": "gross price",
//!       "function": "apply_vat",
//!       "input": { "fields": ["net"], "variables": ["vat_rate"] },
//!       "output": { "field": "gross" }
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{Calculation, CalculateFn, EngineContext, Target};
use crate::error::ConfigError;
use crate::host::FieldHandle;
use crate::value::Value;

/// Turns the raw text of an element into a stored value.
pub type FormatInput = Arc<dyn Fn(&str, &dyn FieldHandle) -> Value + Send + Sync>;

/// Turns a calculated value into the text written back into an element.
pub type FormatOutput = Arc<dyn Fn(&Value, &dyn FieldHandle) -> String + Send + Sync>;

/// Default cascade depth cap, used when cycles are allowed.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 256;

/// Tunables that are plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Accept calculations that form a dependency cycle.
    ///
    /// When `false` such configurations are rejected at construction.
    pub allow_cycles: bool,

    /// Maximum cascade recursion depth, enforced only when `allow_cycles`
    /// is set.
    pub max_cascade_depth: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            allow_cycles: false,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}

impl EngineSettings {
    /// Parse settings from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything needed to build an engine.
#[derive(Clone)]
pub struct EngineConfig {
    pub calculations: Vec<Calculation>,
    pub format_input: FormatInput,
    pub format_output: FormatOutput,
    pub settings: EngineSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calculations: Vec::new(),
            format_input: Arc::new(|raw: &str, _: &dyn FieldHandle| Value::Text(raw.to_string())),
            format_output: Arc::new(|value: &Value, _: &dyn FieldHandle| value.to_string()),
            settings: EngineSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default hooks and no calculations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a calculation. Registration order is execution order.
    pub fn with_calculation(mut self, calculation: Calculation) -> Self {
        self.calculations.push(calculation);
        self
    }

    /// Append several calculations.
    pub fn with_calculations<I>(mut self, calculations: I) -> Self
    where
        I: IntoIterator<Item = Calculation>,
    {
        self.calculations.extend(calculations);
        self
    }

    /// Replace the input formatting hook.
    pub fn with_format_input<F>(mut self, format: F) -> Self
    where
        F: Fn(&str, &dyn FieldHandle) -> Value + Send + Sync + 'static,
    {
        self.format_input = Arc::new(format);
        self
    }

    /// Replace the output formatting hook.
    pub fn with_format_output<F>(mut self, format: F) -> Self
    where
        F: Fn(&Value, &dyn FieldHandle) -> String + Send + Sync + 'static,
    {
        self.format_output = Arc::new(format);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("calculations", &self.calculations)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Named calculation functions that manifests can refer to.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, CalculateFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `calculate` under `name`, replacing any previous entry.
    pub fn register<F, R>(&mut self, name: &str, calculate: F)
    where
        F: Fn(&EngineContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let calculate: CalculateFn = Arc::new(move |ctx: &EngineContext<'_>| calculate(ctx).into());
        self.functions.insert(name.to_string(), calculate);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F, R>(mut self, name: &str, calculate: F) -> Self
    where
        F: Fn(&EngineContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        self.register(name, calculate);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CalculateFn> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionTable")
            .field("functions", &names)
            .finish()
    }
}

/// Declared inputs of a manifest calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputDecl {
    pub fields: Vec<String>,
    pub variables: Vec<String>,
}

/// One calculation in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationDecl {
    #[serde(default)]
    pub name: Option<String>,

    /// Key into the [`FunctionTable`].
    pub function: String,

    #[serde(default)]
    pub input: InputDecl,

    pub output: Target,
}

/// A declarative form description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormManifest {
    #[serde(default)]
    pub settings: EngineSettings,

    #[serde(default)]
    pub calculations: Vec<CalculationDecl>,
}

impl FormManifest {
    /// Parse a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Bind every declared calculation to its function.
    ///
    /// The resulting configuration uses the default formatting hooks.
    pub fn into_config(self, functions: &FunctionTable) -> Result<EngineConfig, ConfigError> {
        let calculations = self
            .calculations
            .into_iter()
            .map(|decl| {
                let calculate = functions
                    .get(&decl.function)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownFunction(decl.function.clone()))?;
                let calculation = Calculation::from_fn(decl.output, calculate)
                    .reads_fields(decl.input.fields)
                    .reads_variables(decl.input.variables);
                Ok(match decl.name {
                    Some(name) => calculation.named(name),
                    None => calculation,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(EngineConfig::new()
            .with_calculations(calculations)
            .with_settings(self.settings))
    }
}
