//! Host Capabilities
//!
//! The engine never touches a concrete UI toolkit. It talks to its host
//! through two traits:
//!
//! - [`FieldHandle`]: one input element, with a stable identity, a name and a
//!   mutable text value.
//! - [`Container`]: the element that surrounds a form. It enumerates its
//!   managed fields, answers containment and membership questions, and
//!   resolves the element a calculated field is written back to.
//!
//! Change notifications arrive as [`ChangeEvent`]s. How the host produces
//! them is up to the host.
//!
//! [`memory`] provides an in-memory host used for headless forms and tests.

pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl ElementId {
    /// Generate a new unique element ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for ElementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A form field element owned by the host.
pub trait FieldHandle: Send + Sync {
    /// Stable identity of the element.
    fn id(&self) -> ElementId;

    /// The field name, used as the key in the value store.
    fn name(&self) -> &str;

    /// The current raw value shown in the element.
    fn value(&self) -> String;

    /// Replace the value shown in the element.
    fn set_value(&self, value: &str);
}

/// The element surrounding one form.
pub trait Container: Send + Sync {
    /// All managed field elements inside this container, in document order.
    fn managed_fields(&self) -> Vec<Arc<dyn FieldHandle>>;

    /// Check if `element` is a descendant of this container.
    fn contains(&self, element: &dyn FieldHandle) -> bool;

    /// Check if `element` is marked as part of a managed form.
    fn is_managed(&self, element: &dyn FieldHandle) -> bool;

    /// Resolve the managed element named `name` inside this container.
    fn field_named(&self, name: &str) -> Option<Arc<dyn FieldHandle>>;
}

/// A "field value changed" notification from the host.
#[derive(Clone)]
pub struct ChangeEvent {
    /// The element whose value changed.
    pub target: Arc<dyn FieldHandle>,
}

impl ChangeEvent {
    /// Create a change event for `target`.
    pub fn new(target: Arc<dyn FieldHandle>) -> Self {
        Self { target }
    }
}

impl fmt::Debug for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("id", &self.target.id())
            .field("name", &self.target.name())
            .finish()
    }
}
