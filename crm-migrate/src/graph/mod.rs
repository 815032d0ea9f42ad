//! Migration graph
//!
//! The [`Migrator`] owns every node of a run, keyed by entity handle, and
//! the worklist of leaf nodes that are candidates for execution. A run
//! covers a single namespace (every module is looked up in the configured
//! one), so the handle alone identifies a node the same way
//! [`Node::compare`] does:
//! - `builder` turns sources and schema metadata into nodes and edges
//! - `acyclic` splices back-edges so the graph becomes a DAG
//! - `scheduler` executes leaves until the graph is exhausted

mod acyclic;
mod builder;
mod scheduler;

use std::collections::HashMap;

use crate::node::Node;

#[derive(Debug, Default)]
pub struct Migrator {
    /// Every node discovered so far
    nodes: HashMap<String, Node>,
    /// Discovery order of `nodes`, keeps traversal deterministic
    order: Vec<String>,
    /// Execution candidates
    leafs: Vec<String>,
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, merging it into an existing node for the same entity
    ///
    /// Returns the registry key of the node that now represents the entity.
    pub fn add_node(&mut self, node: Node) -> String {
        let key = node.name.clone();
        match self.nodes.get_mut(&key) {
            Some(existing) => {
                debug_assert!(existing.compare(&node), "'{}' registered from two namespaces", key);
                existing.merge(node)
            }
            None => {
                self.order.push(key.clone());
                self.nodes.insert(key.clone(), node);
            }
        }
        key
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    /// Nodes in discovery order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|k| self.nodes.get(k))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leafs(&self) -> &[String] {
        &self.leafs
    }

    /// Nodes that list `name` as a dependency
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.nodes()
            .filter(|n| n.depends_on(name))
            .map(|n| n.name.clone())
            .collect()
    }

    /// Seed the worklist with every node that has no dependencies
    pub fn collect_leafs(&mut self) -> usize {
        let leafs: Vec<String> = self
            .nodes()
            .filter(|n| !n.has_children())
            .map(|n| n.name.clone())
            .collect();

        for leaf in leafs {
            self.push_leaf(leaf);
        }
        self.leafs.len()
    }

    /// Append to the worklist unless an equal node is already queued
    pub fn push_leaf(&mut self, name: String) -> bool {
        if self.leafs.contains(&name) {
            return false;
        }
        self.leafs.push(name);
        true
    }
}
