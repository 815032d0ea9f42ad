//! Migration nodes
//!
//! A node is one entity's import task together with the entities it depends
//! on. Edges are stored as entity handles; the [`crate::graph::Migrator`]
//! owns every node and resolves handles against its registry.

use std::collections::HashSet;

use crate::error::{MigrateError, Result};
use crate::identity::IdentityMap;
use crate::record::{IdMap, Record, RecordStore, Value};
use crate::schema::{FieldKind, Schema};
use crate::source::TabularSource;

/// A `Record` field and the module it points at
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub field: String,
    pub target: Schema,
}

/// Everything a node needs from the outside while migrating its rows
pub struct MigrationContext<'a> {
    pub records: &'a mut dyn RecordStore,
    pub identities: &'a IdentityMap,
    pub ids: &'a mut IdMap,
    pub identity_entity: &'a str,
    /// Entities currently registered in the graph
    pub known: &'a HashSet<String>,
}

/// Result of migrating a single node
#[derive(Debug, Default)]
pub struct NodeMigration {
    pub rows: usize,
    /// Reference cells written as null because their target was not migrated yet
    pub unresolved: usize,
    /// Entities referenced by the rows that the graph did not know about
    pub discovered: Vec<Node>,
}

/// How a source column is turned into a record value
#[derive(Debug, Clone, PartialEq)]
enum Resolve {
    Text,
    Identity,
    Record(String),
}

#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub schema: Schema,
    /// Rows to import; `None` for nodes that only exist to satisfy a reference
    pub source: Option<TabularSource>,
    pub references: Vec<Reference>,
    /// Transient traversal marker for cycle breaking
    pub visited: bool,
    children: Vec<String>,
    spliced: Vec<String>,
}

impl Node {
    pub fn new(schema: Schema, source: Option<TabularSource>) -> Self {
        Self {
            name: schema.handle.clone(),
            schema,
            source,
            references: Vec::new(),
            visited: false,
            children: Vec::new(),
            spliced: Vec::new(),
        }
    }

    /// Node without a source, created because another entity references it
    pub fn structural(schema: Schema) -> Self {
        Self::new(schema, None)
    }

    /// Same entity, regardless of which instance
    pub fn compare(&self, other: &Node) -> bool {
        self.name == other.name && self.schema.namespace == other.schema.namespace
    }

    /// Fold another instance of the same entity into this one
    ///
    /// Edges are unioned, so merging never drops a dependency and merging the
    /// same node twice changes nothing. Edges removed by [`Node::splice`] are
    /// not restored. A node keeps its own source; the builder rejects a
    /// second source for an entity before it gets here.
    pub fn merge(&mut self, other: Node) {
        if self.source.is_none() {
            self.source = other.source;
        } else if other.source.is_some() {
            log::warn!("'{}' already has a source, ignoring the merged one", self.name);
        }

        for child in other.children {
            self.link_add(&child);
        }

        for reference in other.references {
            if !self.references.iter().any(|r| r.field == reference.field) {
                self.references.push(reference);
            }
        }
    }

    /// Register `dependency` as a prerequisite of this node
    pub fn link_add(&mut self, dependency: &str) {
        if self.spliced.iter().any(|s| s == dependency) {
            return;
        }
        if !self.children.iter().any(|c| c == dependency) {
            self.children.push(dependency.to_string());
        }
    }

    pub fn add_reference(&mut self, reference: Reference) {
        if !self.references.iter().any(|r| r.field == reference.field) {
            self.references.push(reference);
        }
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// Dependencies removed to break cycles
    pub fn spliced(&self) -> &[String] {
        &self.spliced
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.children.iter().any(|c| c == name)
    }

    /// True once every dependency has been migrated
    pub fn satisfied(&self, completed: &HashSet<String>) -> bool {
        self.children.iter().all(|c| completed.contains(c))
    }

    /// Remove the edge to `from`, the ancestor that closes a cycle
    ///
    /// The referenced entity is still migrated; it just no longer blocks this
    /// node. Returns false if there was no such edge.
    pub fn splice(&mut self, from: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != from);
        if self.children.len() == before {
            return false;
        }
        self.spliced.push(from.to_string());
        true
    }

    fn column_plan(&self, header: &[String], identity_entity: &str) -> Vec<Option<(String, Resolve)>> {
        let mut dropped = Vec::new();
        let mut plan = Vec::with_capacity(header.len());

        for (i, column) in header.iter().enumerate() {
            let Some(field) = self.schema.field(column) else {
                // The first column is the source id, not a field
                if i > 0 {
                    dropped.push(column.as_str());
                }
                plan.push(None);
                continue;
            };

            let resolve = match field.kind {
                FieldKind::User => Resolve::Identity,
                FieldKind::Record => match self.references.iter().find(|r| r.field == field.name) {
                    Some(r) if r.target.handle == identity_entity => Resolve::Identity,
                    Some(r) => Resolve::Record(r.target.handle.clone()),
                    None => {
                        log::warn!(
                            "'{}.{}' has no resolved reference target, dropping column",
                            self.name,
                            field.name
                        );
                        plan.push(None);
                        continue;
                    }
                },
                _ => Resolve::Text,
            };
            plan.push(Some((field.name.clone(), resolve)));
        }

        if !dropped.is_empty() {
            log::debug!("'{}' ignores columns not on the module: {}", self.name, dropped.join(", "));
        }

        plan
    }

    /// Import every row of the source
    ///
    /// Reference cells are resolved against the identity map or the ids of
    /// records already written. Nodes without a source do nothing and only
    /// unblock their dependents.
    pub fn migrate(&mut self, ctx: &mut MigrationContext<'_>) -> Result<NodeMigration> {
        let mut outcome = NodeMigration::default();

        let Some(mut source) = self.source.take() else {
            log::debug!("'{}' has no source, nothing to import", self.name);
            return Ok(outcome);
        };

        for reference in &self.references {
            let target = &reference.target.handle;
            if target != ctx.identity_entity
                && !ctx.known.contains(target)
                && !outcome.discovered.iter().any(|n| &n.name == target)
            {
                log::warn!("'{}' references '{}' which is not part of the graph", self.name, target);
                outcome
                    .discovered
                    .push(Node::structural(reference.target.clone()));
            }
        }

        let plan = self.column_plan(source.header(), ctx.identity_entity);

        while let Some(row) = source.next_row()? {
            let source_id = row.get(0).map(str::trim).unwrap_or("");
            let mut record = Record::new(source_id);

            for (i, column) in plan.iter().enumerate() {
                let Some((name, resolve)) = column else {
                    continue;
                };

                let cell = row.get(i).map(str::trim).unwrap_or("");
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    let resolved = match resolve {
                        Resolve::Text => Some(Value::String(cell.to_string())),
                        Resolve::Identity => ctx.identities.get(cell).map(|id| Value::Ref(*id)),
                        Resolve::Record(target) => ctx.ids.resolve(target, cell).map(Value::Ref),
                    };
                    resolved.unwrap_or_else(|| {
                        outcome.unresolved += 1;
                        Value::Null
                    })
                };
                record.set(name.clone(), value);
            }

            let saved = ctx
                .records
                .create(&self.name, record)
                .map_err(|e| MigrateError::store(&self.name, e))?;

            if let Some(id) = saved.id {
                if !source_id.is_empty() {
                    ctx.ids.insert(&self.name, source_id, id);
                }
            }
            outcome.rows += 1;
        }

        log::info!(
            "Migrated '{}': {} rows, {} unresolved references",
            self.name,
            outcome.rows,
            outcome.unresolved
        );

        Ok(outcome)
    }
}
