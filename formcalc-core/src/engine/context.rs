//! Engine Context
//!
//! Calculations receive an [`EngineContext`] when they run. It gives
//! read-only access to the value store and the decimal helpers, so a
//! calculation can look up any field or variable, not only the one that
//! triggered it.

use super::store::ValueStore;
use crate::decimal;
use crate::value::Value;

/// Read access to an engine's values during a calculation.
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    store: &'a ValueStore,
}

impl<'a> EngineContext<'a> {
    /// Create a context over `store`.
    pub fn new(store: &'a ValueStore) -> Self {
        Self { store }
    }

    /// Current value of the field `name`, if stored.
    pub fn resolve_field(&self, name: &str) -> Option<&'a Value> {
        self.store.field(name)
    }

    /// Current value of the variable `name`, if stored.
    pub fn resolve_variable(&self, name: &str) -> Option<&'a Value> {
        self.store.variable(name)
    }

    /// The field `name` as a number. Missing or non-numeric values are NaN.
    pub fn field(&self, name: &str) -> f64 {
        self.resolve_field(name).map_or(f64::NAN, Value::as_f64)
    }

    /// The variable `name` as a number. Missing or non-numeric values are NaN.
    pub fn variable(&self, name: &str) -> f64 {
        self.resolve_variable(name).map_or(f64::NAN, Value::as_f64)
    }

    /// See [`decimal::add`].
    pub fn add(&self, left: f64, right: f64) -> f64 {
        decimal::add(left, right)
    }

    /// See [`decimal::subtract`].
    pub fn subtract(&self, left: f64, right: f64) -> f64 {
        decimal::subtract(left, right)
    }

    /// See [`decimal::multiply`].
    pub fn multiply(&self, left: f64, right: f64) -> f64 {
        decimal::multiply(left, right)
    }

    /// See [`decimal::divide`].
    pub fn divide(&self, left: f64, right: f64) -> f64 {
        decimal::divide(left, right)
    }
}
