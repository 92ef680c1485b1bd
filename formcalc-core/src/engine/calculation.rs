//! Calculation Descriptors
//!
//! A [`Calculation`] declares which fields and variables it reads, the single
//! [`Target`] it writes, and the function that produces the value.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::context::EngineContext;
use crate::value::Value;

/// The function body of a calculation.
pub type CalculateFn = Arc<dyn Fn(&EngineContext<'_>) -> Value + Send + Sync>;

/// A named slot in the value store: either a field or a variable.
///
/// Serializes as `{"field": "name"}` or `{"variable": "name"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// A field backed by a host element.
    Field(String),
    /// A variable with no visible element.
    Variable(String),
}

impl Target {
    /// Create a field target.
    pub fn field(name: impl Into<String>) -> Self {
        Target::Field(name.into())
    }

    /// Create a variable target.
    pub fn variable(name: impl Into<String>) -> Self {
        Target::Variable(name.into())
    }

    /// The bare name, without the field/variable tag.
    pub fn name(&self) -> &str {
        match self {
            Target::Field(name) | Target::Variable(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Field(name) => write!(f, "field:{name}"),
            Target::Variable(name) => write!(f, "variable:{name}"),
        }
    }
}

/// A registered calculation.
///
/// # Example
///
/// ```rust
/// use formcalc_core::engine::Calculation;
///
/// let gross = Calculation::to_field("gross", |ctx| ctx.multiply(ctx.field("net"), 1.19))
///     .reads_field("net")
///     .named("gross price");
///
/// assert_eq!(gross.name(), "gross price");
/// ```
#[derive(Clone)]
pub struct Calculation {
    name: Option<String>,
    fields: SmallVec<[String; 4]>,
    variables: SmallVec<[String; 4]>,
    output: Target,
    calculate: CalculateFn,
}

impl Calculation {
    /// Create a calculation writing to `output`.
    ///
    /// Inputs are declared afterwards with [`reads_field`](Self::reads_field)
    /// and [`reads_variable`](Self::reads_variable).
    pub fn new<F, R>(output: Target, calculate: F) -> Self
    where
        F: Fn(&EngineContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::from_fn(output, Arc::new(move |ctx: &EngineContext<'_>| calculate(ctx).into()))
    }

    /// Create a calculation from an already shared function.
    pub fn from_fn(output: Target, calculate: CalculateFn) -> Self {
        Self {
            name: None,
            fields: SmallVec::new(),
            variables: SmallVec::new(),
            output,
            calculate,
        }
    }

    /// Create a calculation writing to the field `name`.
    pub fn to_field<F, R>(name: &str, calculate: F) -> Self
    where
        F: Fn(&EngineContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::new(Target::field(name), calculate)
    }

    /// Create a calculation writing to the variable `name`.
    pub fn to_variable<F, R>(name: &str, calculate: F) -> Self
    where
        F: Fn(&EngineContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::new(Target::variable(name), calculate)
    }

    /// Declare a field input.
    pub fn reads_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Declare several field inputs.
    pub fn reads_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare a variable input.
    pub fn reads_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(name.into());
        self
    }

    /// Declare several variable inputs.
    pub fn reads_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables.extend(names.into_iter().map(Into::into));
        self
    }

    /// Attach a name used in logs and error messages.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The diagnostic name, defaulting to the output target.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.output.to_string(),
        }
    }

    /// The target this calculation writes.
    pub fn output(&self) -> &Target {
        &self.output
    }

    /// Declared field inputs.
    pub fn input_fields(&self) -> &[String] {
        &self.fields
    }

    /// Declared variable inputs.
    pub fn input_variables(&self) -> &[String] {
        &self.variables
    }

    /// All declared inputs, fields first.
    pub fn inputs(&self) -> impl Iterator<Item = Target> + '_ {
        self.fields
            .iter()
            .map(|name| Target::Field(name.clone()))
            .chain(self.variables.iter().map(|name| Target::Variable(name.clone())))
    }

    /// Check if a change to `trigger` must re-run this calculation.
    pub fn depends_on(&self, trigger: &Target) -> bool {
        match trigger {
            Target::Field(name) => self.fields.iter().any(|f| f == name),
            Target::Variable(name) => self.variables.iter().any(|v| v == name),
        }
    }

    /// Run the calculation body.
    pub fn evaluate(&self, ctx: &EngineContext<'_>) -> Value {
        (self.calculate)(ctx)
    }
}

impl fmt::Debug for Calculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calculation")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("variables", &self.variables)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
