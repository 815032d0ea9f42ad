//! Leaf-first execution of the migration graph
//!
//! Each node goes Pending -> Satisfied -> Migrated. A node is queued once it
//! has no dependencies or once one of its dependencies finishes; it only runs
//! when every dependency has been migrated. Execution is sequential: a node's
//! rows see every record written by the nodes before it.

use std::collections::HashSet;

use crate::error::{MigrateError, Result};
use crate::identity::IdentityMap;
use crate::node::MigrationContext;
use crate::record::{IdMap, RecordStore};
use crate::report::MigrationReport;

use super::Migrator;

impl Migrator {
    /// Migrate every node, dependencies first
    ///
    /// Expects [`Migrator::make_acyclic`] and [`Migrator::collect_leafs`] to
    /// have run. Fails with [`MigrateError::InconsistentGraph`] if nodes are
    /// left that can never become satisfied.
    pub fn execute(
        &mut self,
        records: &mut dyn RecordStore,
        identities: &IdentityMap,
        identity_entity: &str,
        report: &mut MigrationReport,
    ) -> Result<()> {
        let mut completed: HashSet<String> = HashSet::new();
        let mut ids = IdMap::new();
        let mut known: HashSet<String> = self.nodes.keys().cloned().collect();

        while !self.leafs.is_empty() {
            let mut progressed = false;

            // Reverse scan so removals keep the remaining indices valid
            let mut i = self.leafs.len();
            while i > 0 {
                i -= 1;
                let key = self.leafs[i].clone();

                if completed.contains(&key) {
                    self.leafs.remove(i);
                    continue;
                }

                let satisfied = self
                    .nodes
                    .get(&key)
                    .is_some_and(|n| n.satisfied(&completed));
                if !satisfied {
                    continue;
                }

                let node = match self.nodes.get_mut(&key) {
                    Some(node) => node,
                    None => continue,
                };

                log::debug!("Migrating '{}'", key);
                let outcome = {
                    let mut ctx = MigrationContext {
                        records: &mut *records,
                        identities,
                        ids: &mut ids,
                        identity_entity,
                        known: &known,
                    };
                    node.migrate(&mut ctx)?
                };

                self.leafs.remove(i);
                completed.insert(key.clone());
                report.record_node(&key, &outcome);
                progressed = true;

                for discovered in outcome.discovered {
                    let name = self.add_node(discovered);
                    known.insert(name.clone());
                    if !completed.contains(&name) {
                        self.push_leaf(name);
                    }
                }

                for dependent in self.dependents(&key) {
                    if !completed.contains(&dependent) {
                        self.push_leaf(dependent);
                    }
                }
            }

            if !progressed {
                return Err(MigrateError::InconsistentGraph {
                    pending: self.pending(&completed),
                });
            }
        }

        let pending = self.pending(&completed);
        if !pending.is_empty() {
            return Err(MigrateError::InconsistentGraph { pending });
        }

        log::info!("Migrated {} nodes", completed.len());
        Ok(())
    }

    fn pending(&self, completed: &HashSet<String>) -> Vec<String> {
        self.order
            .iter()
            .filter(|k| !completed.contains(*k))
            .cloned()
            .collect()
    }
}
