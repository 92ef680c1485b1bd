//! Dependency Graph
//!
//! This module holds the static dependency structure of an engine's
//! calculations.
//!
//! # Overview
//!
//! The graph is a directed graph where:
//!
//! - Nodes are fields or variables ([`Target`](crate::engine::Target)s)
//! - Edges run from a calculation input to the calculation output
//!
//! The cascade itself does not walk the graph; it follows registration
//! order. The graph exists to reject cyclic configurations up front and to
//! answer ordering questions ("what does this field affect?").
//!
//! We maintain both forward (dependencies) and reverse (dependents) edges to
//! enable efficient traversal in both directions.

mod node;
mod topology;

pub use node::{Node, NodeKind};
pub use topology::DependencyGraph;
