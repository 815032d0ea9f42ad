//! Cycle breaking
//!
//! Mutually referencing modules are normal in CRM data (an account points at
//! its primary contact, the contact points back at the account), so cycles
//! are removed rather than rejected. A depth-first pass splices every edge
//! that leads back onto the current traversal path. Only that edge goes; the
//! node keeps all of its other dependencies.
//!
//! Which edge of a cycle is removed depends on the traversal order, i.e. the
//! order nodes were discovered in.

use std::collections::HashSet;

use super::Migrator;

impl Migrator {
    /// Turn the graph into a DAG, returning the removed `(node, dependency)` edges
    pub fn make_acyclic(&mut self) -> Vec<(String, String)> {
        for node in self.nodes.values_mut() {
            node.visited = false;
        }

        let mut spliced = Vec::new();
        let mut path = HashSet::new();

        for key in self.order.clone() {
            let visited = self.nodes.get(&key).is_none_or(|n| n.visited);
            if !visited {
                self.traverse(&key, &mut path, &mut spliced);
            }
        }

        if !spliced.is_empty() {
            log::info!("Removed {} cyclic dependencies", spliced.len());
        }
        spliced
    }

    fn traverse(
        &mut self,
        key: &str,
        path: &mut HashSet<String>,
        spliced: &mut Vec<(String, String)>,
    ) {
        let children = match self.nodes.get_mut(key) {
            Some(node) => {
                node.visited = true;
                node.children().to_vec()
            }
            None => return,
        };
        path.insert(key.to_string());

        for child in children {
            if path.contains(&child) {
                if let Some(node) = self.nodes.get_mut(key) {
                    node.splice(&child);
                }
                log::debug!("Splicing {} -> {}", key, child);
                spliced.push((key.to_string(), child));
                continue;
            }

            let unvisited = self.nodes.get(&child).is_some_and(|n| !n.visited);
            if unvisited {
                self.traverse(&child, path, spliced);
            }
        }

        path.remove(key);
    }

    /// True if some node can reach itself through its dependencies
    pub fn has_cycle(&self) -> bool {
        // 1 = on the current path, 2 = fully explored
        fn reaches_stack(
            migrator: &Migrator,
            key: &str,
            state: &mut std::collections::HashMap<String, u8>,
        ) -> bool {
            match state.get(key).copied() {
                Some(1) => return true,
                Some(2) => return false,
                _ => {}
            }
            state.insert(key.to_string(), 1);
            if let Some(node) = migrator.node(key) {
                for child in node.children() {
                    if reaches_stack(migrator, child, state) {
                        return true;
                    }
                }
            }
            state.insert(key.to_string(), 2);
            false
        }

        let mut state = std::collections::HashMap::new();
        self.order
            .iter()
            .any(|key| reaches_stack(self, key, &mut state))
    }
}
