//! Value Store
//!
//! Two independent maps, one for fields and one for variables. Both keep
//! insertion order: the initial calculation pass visits fields in the order
//! they were first stored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::calculation::Target;
use crate::value::Value;

/// Current field and variable values of one engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueStore {
    fields: IndexMap<String, Value>,
    variables: IndexMap<String, Value>,
}

impl ValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Look up a field or variable.
    pub fn get(&self, target: &Target) -> Option<&Value> {
        match target {
            Target::Field(name) => self.field(name),
            Target::Variable(name) => self.variable(name),
        }
    }

    /// Store a field value, overwriting any previous one.
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Store a variable value, overwriting any previous one.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    /// Store a field or variable value.
    pub fn set(&mut self, target: &Target, value: Value) {
        match target {
            Target::Field(name) => self.set_field(name, value),
            Target::Variable(name) => self.set_variable(name, value),
        }
    }

    /// Field names in store-population order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_and_variables_are_independent() {
        let mut store = ValueStore::new();
        store.set_field("total", Value::Number(1.0));
        store.set_variable("total", Value::Number(2.0));

        assert_eq!(store.get(&Target::field("total")), Some(&Value::Number(1.0)));
        assert_eq!(store.get(&Target::variable("total")), Some(&Value::Number(2.0)));
        assert_eq!(store.field_count(), 1);
        assert_eq!(store.variable_count(), 1);
    }

    #[test]
    fn overwrite_keeps_first_insertion_position() {
        let mut store = ValueStore::new();
        store.set_field("b", Value::from("1"));
        store.set_field("a", Value::from("2"));
        store.set(&Target::field("b"), Value::Number(3.0));

        assert_eq!(store.field_names(), vec!["b", "a"]);
        assert_eq!(store.field("b"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut store = ValueStore::new();
        store.set_field("net", Value::from("100"));
        store.set_field("gross", Value::Number(119.0));
        store.set_variable("rate", Value::Number(0.19));

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fields": { "net": "100", "gross": 119.0 },
                "variables": { "rate": 0.19 }
            })
        );
    }
}
