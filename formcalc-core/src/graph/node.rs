//! Graph Nodes
//!
//! This module defines the node type that lives in the dependency graph.

use indexmap::IndexSet;

use crate::engine::Target;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node. Nothing computes it; it only changes through user
    /// input.
    Source,

    /// A derived node. At least one calculation writes to it.
    Derived,
}

/// A node in the dependency graph.
///
/// Edge sets keep insertion order so traversals are deterministic.
#[derive(Debug)]
pub struct Node {
    /// The field or variable this node stands for.
    target: Target,

    /// What kind of node this is.
    kind: NodeKind,

    /// Targets this node is computed from.
    dependencies: IndexSet<Target>,

    /// Targets computed from this node.
    dependents: IndexSet<Target>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(target: Target, kind: NodeKind) -> Self {
        Self {
            target,
            kind,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    /// Create a new source node.
    pub fn source(target: Target) -> Self {
        Self::new(target, NodeKind::Source)
    }

    /// Create a new derived node.
    pub fn derived(target: Target) -> Self {
        Self::new(target, NodeKind::Derived)
    }

    /// Get the node's target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Promote a source node to a derived node.
    pub fn mark_derived(&mut self) {
        self.kind = NodeKind::Derived;
    }

    /// Add a dependency (a node that this node is computed from).
    pub fn add_dependency(&mut self, target: Target) {
        self.dependencies.insert(target);
    }

    /// Get all dependencies.
    pub fn dependencies(&self) -> &IndexSet<Target> {
        &self.dependencies
    }

    /// Add a dependent (a node computed from this node).
    pub fn add_dependent(&mut self, target: Target) {
        self.dependents.insert(target);
    }

    /// Get all dependents.
    pub fn dependents(&self) -> &IndexSet<Target> {
        &self.dependents
    }
}
