//! Run summary

use std::collections::BTreeMap;

use serde::Serialize;

use crate::node::NodeMigration;

/// What a migration run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    /// Identities mapped by the pre-pass
    pub identities: usize,
    /// Nodes in the graph after building
    pub nodes: usize,
    /// Nodes without dependencies once cycles were removed
    pub entry_points: usize,
    /// Dependencies removed to break cycles, as (node, dependency)
    pub spliced: Vec<(String, String)>,
    /// Nodes in the order they were migrated
    pub order: Vec<String>,
    /// Records written per entity
    pub records: BTreeMap<String, usize>,
    /// Reference cells that were written as null
    pub unresolved: usize,
}

impl MigrationReport {
    pub fn record_node(&mut self, name: &str, outcome: &NodeMigration) {
        self.order.push(name.to_string());
        if outcome.rows > 0 {
            *self.records.entry(name.to_string()).or_default() += outcome.rows;
        }
        self.unresolved += outcome.unresolved;
    }

    pub fn total_records(&self) -> usize {
        self.records.values().sum()
    }

    /// Position of a node in the migration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_node_accumulates() {
        let mut report = MigrationReport::default();
        report.record_node(
            "Account",
            &NodeMigration {
                rows: 3,
                unresolved: 1,
                discovered: Vec::new(),
            },
        );
        report.record_node("Lead", &NodeMigration::default());

        assert_eq!(report.total_records(), 3);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.position("Lead"), Some(1));
        assert!(!report.records.contains_key("Lead"));
    }
}
