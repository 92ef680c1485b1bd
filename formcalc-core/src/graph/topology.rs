//! Dependency Topology
//!
//! [`DependencyGraph`] holds one node per field or variable that any
//! calculation reads or writes, with an edge from each input to the output it
//! feeds.
//!
//! # Algorithm
//!
//! Ordering uses Kahn's algorithm:
//!
//! 1. Count, for every node, the dependencies inside the node set
//! 2. Queue the nodes with no such dependency, in insertion order
//! 3. Pop a node, emit it, and decrement the count of each dependent
//! 4. Any node left with a non-zero count sits on or behind a cycle
//!
//! When nodes are left over, the graph walks backwards along dependencies
//! from one of them until it revisits a node, which yields a concrete cycle
//! to report.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use super::node::{Node, NodeKind};
use crate::engine::Target;

/// Directed graph of calculation inputs and outputs.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// All nodes in the graph, in first-seen order.
    nodes: IndexMap<Target, Node>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Record one calculation: every input feeds `output`.
    pub fn add_calculation<'a, I>(&mut self, inputs: I, output: &Target)
    where
        I: IntoIterator<Item = &'a Target>,
    {
        self.ensure_node(output).mark_derived();
        for input in inputs {
            self.ensure_node(input);
            self.add_edge(input, output);
        }
    }

    fn ensure_node(&mut self, target: &Target) -> &mut Node {
        self.nodes
            .entry(target.clone())
            .or_insert_with(|| Node::source(target.clone()))
    }

    /// Add a dependency edge: `dependent` is computed from `dependency`.
    pub fn add_edge(&mut self, dependency: &Target, dependent: &Target) {
        if let Some(node) = self.nodes.get_mut(dependency) {
            node.add_dependent(dependent.clone());
        }
        if let Some(node) = self.nodes.get_mut(dependent) {
            node.add_dependency(dependency.clone());
        }
    }

    /// Targets written by at least one calculation, in first-seen order.
    pub fn derived(&self) -> impl Iterator<Item = &Target> {
        self.nodes
            .values()
            .filter(|node| node.kind() == NodeKind::Derived)
            .map(Node::target)
    }

    /// Order every node so that dependencies come before dependents.
    ///
    /// Returns the cycle path when the graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<Target>, Vec<Target>> {
        let all: Vec<Target> = self.nodes.keys().cloned().collect();
        let ordered = self.topological_sort(&all);
        if ordered.len() == all.len() {
            return Ok(ordered);
        }

        let emitted: HashSet<&Target> = ordered.iter().collect();
        let remaining: IndexSet<Target> = all
            .into_iter()
            .filter(|target| !emitted.contains(target))
            .collect();
        Err(self.find_cycle(&remaining))
    }

    /// Everything transitively computed from `source`, dependencies first.
    ///
    /// `source` itself is not part of the result. Nodes on a cycle are left
    /// out because they have no valid position.
    pub fn downstream(&self, source: &Target) -> Vec<Target> {
        let mut reached = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(node) = self.nodes.get(source) {
            queue.extend(node.dependents().iter().cloned());
        }

        // BFS over dependents
        while let Some(target) = queue.pop_front() {
            if !visited.insert(target.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&target) {
                queue.extend(node.dependents().iter().cloned());
            }
            reached.push(target);
        }

        self.topological_sort(&reached)
    }

    /// Kahn's algorithm restricted to `targets`.
    fn topological_sort(&self, targets: &[Target]) -> Vec<Target> {
        let target_set: HashSet<&Target> = targets.iter().collect();
        let mut in_degree: HashMap<&Target, usize> = HashMap::new();
        let mut result = Vec::with_capacity(targets.len());
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the set)
        for target in targets {
            if let Some(node) = self.nodes.get(target) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|dep| target_set.contains(dep))
                    .count();
                in_degree.insert(target, degree);
                if degree == 0 {
                    queue.push_back(target);
                }
            }
        }

        while let Some(target) = queue.pop_front() {
            result.push(target.clone());

            if let Some(node) = self.nodes.get(target) {
                for dependent in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            if let Some((key, _)) = self.nodes.get_key_value(dependent) {
                                queue.push_back(key);
                            }
                        }
                    }
                }
            }
        }

        result
    }

    /// Walk backwards along dependencies inside `remaining` until a node
    /// repeats.
    fn find_cycle(&self, remaining: &IndexSet<Target>) -> Vec<Target> {
        let Some(start) = remaining.first() else {
            return Vec::new();
        };

        let mut walk: Vec<Target> = Vec::new();
        let mut seen: HashMap<Target, usize> = HashMap::new();
        let mut current = start.clone();

        loop {
            if let Some(&position) = seen.get(&current) {
                // The walk went against the edges, so flip it.
                let mut cycle: Vec<Target> = walk[position..].iter().rev().cloned().collect();
                if let Some(first) = cycle.first().cloned() {
                    cycle.push(first);
                }
                return cycle;
            }
            seen.insert(current.clone(), walk.len());
            walk.push(current.clone());

            let next = self.nodes.get(&current).and_then(|node| {
                node.dependencies()
                    .iter()
                    .find(|dep| remaining.contains(*dep))
                    .cloned()
            });
            match next {
                Some(target) => current = target,
                None => return walk,
            }
        }
    }
}
