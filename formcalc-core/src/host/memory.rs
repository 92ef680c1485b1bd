//! In-Memory Host
//!
//! A minimal host document: containers hold a flat list of field elements,
//! each of which is either managed (part of the calculated form) or not.
//! Useful for headless forms, server-side previews and tests.
//!
//! # Example
//!
//! ```rust
//! use formcalc_core::host::memory::MemoryContainer;
//!
//! let form = MemoryContainer::new();
//! let net = form.add_field("net", "100");
//! form.add_field("gross", "");
//!
//! assert_eq!(form.value_of("net").as_deref(), Some("100"));
//! net.input("120");
//! assert_eq!(form.value_of("net").as_deref(), Some("120"));
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Container, ElementId, FieldHandle};

/// A field element held in memory.
#[derive(Debug)]
pub struct MemoryField {
    id: ElementId,
    name: String,
    value: RwLock<String>,
    managed: bool,

    /// Number of writes made through [`FieldHandle::set_value`].
    writes: AtomicUsize,
}

impl MemoryField {
    fn new(name: &str, value: &str, managed: bool) -> Self {
        Self {
            id: ElementId::new(),
            name: name.to_string(),
            value: RwLock::new(value.to_string()),
            managed,
            writes: AtomicUsize::new(0),
        }
    }

    /// Create a managed field that does not belong to any container.
    pub fn detached(name: &str, value: &str) -> Arc<Self> {
        Arc::new(Self::new(name, value, true))
    }

    /// Simulate the user typing into the field.
    ///
    /// Unlike [`FieldHandle::set_value`] this does not count as a write-back.
    pub fn input(&self, value: &str) {
        *self.value.write() = value.to_string();
    }

    /// Check if this field is marked as managed.
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Number of times the engine wrote into this field.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl FieldHandle for MemoryField {
    fn id(&self) -> ElementId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> String {
        self.value.read().clone()
    }

    fn set_value(&self, value: &str) {
        *self.value.write() = value.to_string();
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A form container held in memory.
#[derive(Debug)]
pub struct MemoryContainer {
    id: ElementId,
    fields: RwLock<Vec<Arc<MemoryField>>>,
}

impl MemoryContainer {
    /// Create an empty container.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ElementId::new(),
            fields: RwLock::new(Vec::new()),
        })
    }

    /// Get the container's element ID.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Append a managed field.
    pub fn add_field(&self, name: &str, value: &str) -> Arc<MemoryField> {
        self.push(MemoryField::new(name, value, true))
    }

    /// Append a field that sits inside the container but is not managed.
    pub fn add_unmanaged_field(&self, name: &str, value: &str) -> Arc<MemoryField> {
        self.push(MemoryField::new(name, value, false))
    }

    fn push(&self, field: MemoryField) -> Arc<MemoryField> {
        let field = Arc::new(field);
        self.fields.write().push(Arc::clone(&field));
        field
    }

    /// Get the first field named `name`, managed or not.
    pub fn field(&self, name: &str) -> Option<Arc<MemoryField>> {
        self.fields
            .read()
            .iter()
            .find(|field| field.name == name)
            .cloned()
    }

    /// Get the current value of the first field named `name`.
    pub fn value_of(&self, name: &str) -> Option<String> {
        self.field(name).map(|field| field.value())
    }

    /// Number of fields in the container.
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Check if the container has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }
}

impl Container for MemoryContainer {
    fn managed_fields(&self) -> Vec<Arc<dyn FieldHandle>> {
        self.fields
            .read()
            .iter()
            .filter(|field| field.managed)
            .map(|field| Arc::clone(field) as Arc<dyn FieldHandle>)
            .collect()
    }

    fn contains(&self, element: &dyn FieldHandle) -> bool {
        let id = element.id();
        self.fields.read().iter().any(|field| field.id == id)
    }

    fn is_managed(&self, element: &dyn FieldHandle) -> bool {
        let id = element.id();
        self.fields
            .read()
            .iter()
            .any(|field| field.id == id && field.managed)
    }

    fn field_named(&self, name: &str) -> Option<Arc<dyn FieldHandle>> {
        self.fields
            .read()
            .iter()
            .find(|field| field.managed && field.name == name)
            .map(|field| Arc::clone(field) as Arc<dyn FieldHandle>)
    }
}
