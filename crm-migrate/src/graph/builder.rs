//! Graph construction from sources and module metadata

use crate::error::{MigrateError, Result};
use crate::node::{Node, Reference};
use crate::schema::SchemaProvider;
use crate::source::Migrateable;

use super::Migrator;

impl Migrator {
    /// Create a node per source and link it to every module it references
    ///
    /// References to `identity_entity` do not become edges; they resolve
    /// through the identity map produced by the pre-pass. The identity source
    /// itself is only imported as records when its module exists.
    pub fn build(
        &mut self,
        inputs: &[Migrateable],
        schemas: &dyn SchemaProvider,
        namespace: &str,
        identity_entity: &str,
    ) -> Result<()> {
        for input in inputs {
            log::info!("Processing '{}'", input.name);

            let schema = match schemas.find_by_handle(namespace, &input.name) {
                Ok(schema) => schema,
                Err(MigrateError::SchemaNotFound { .. }) if input.name == identity_entity => {
                    log::info!(
                        "No module for identity entity '{}', importing identities only",
                        input.name
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            if self.node(&input.name).is_some_and(|n| n.source.is_some()) {
                return Err(MigrateError::Config(format!(
                    "more than one source given for '{}'",
                    input.name
                )));
            }

            let source = input.open()?;
            let key = self.add_node(Node::new(schema.clone(), Some(source)));

            for field in schema.record_fields() {
                let target_id = field.reference_target(&input.name)?;
                let target = schemas.find_by_id(namespace, target_id)?;
                log::debug!("Linking {}.{} -> {} [{}]", input.name, field.name, target.handle, target_id);

                let target_handle = target.handle.clone();
                let reference = Reference {
                    field: field.name.clone(),
                    target: target.clone(),
                };

                if target_handle != identity_entity {
                    self.add_node(Node::structural(target));
                }

                if let Some(node) = self.node_mut(&key) {
                    node.add_reference(reference);
                    if target_handle != identity_entity {
                        node.link_add(&target_handle);
                    }
                }
            }

            log::debug!("Processed '{}'", input.name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldKind, Schema, SchemaCatalog};

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            Schema::new(1, "crm", "Account")
                .with_field(FieldDefinition::record("PrimaryContactId", 2))
                .with_field(FieldDefinition::record("ParentId", 1))
                .with_field(FieldDefinition::new("OwnerId", FieldKind::User)),
            Schema::new(2, "crm", "Contact")
                .with_field(FieldDefinition::record("AccountId", 1))
                .with_field(FieldDefinition::record("CreatedById", 9)),
            Schema::new(3, "crm", "Lead").with_field(FieldDefinition::record("OwnerAccountId", 1)),
            Schema::new(9, "crm", "User"),
        ])
    }

    #[test]
    fn test_build_links_references() {
        let mut migrator = Migrator::new();
        let inputs = vec![
            Migrateable::text("Account", "Id\n"),
            Migrateable::text("Contact", "Id\n"),
        ];

        migrator.build(&inputs, &catalog(), "crm", "User").unwrap();

        assert_eq!(migrator.len(), 2);
        let account = migrator.node("Account").unwrap();
        assert_eq!(account.children(), &["Contact".to_string(), "Account".to_string()]);
        assert!(account.source.is_some());
    }

    #[test]
    fn test_identity_references_are_not_edges() {
        let mut migrator = Migrator::new();
        let inputs = vec![Migrateable::text("Contact", "Id\n")];

        migrator.build(&inputs, &catalog(), "crm", "User").unwrap();

        let contact = migrator.node("Contact").unwrap();
        assert_eq!(contact.children(), &["Account".to_string()]);
        assert!(migrator.node("User").is_none());
        assert_eq!(contact.references.len(), 2);
    }

    #[test]
    fn test_referenced_entity_without_source_is_structural() {
        let mut migrator = Migrator::new();
        let inputs = vec![Migrateable::text("Lead", "Id\n")];

        migrator.build(&inputs, &catalog(), "crm", "User").unwrap();

        let account = migrator.node("Account").unwrap();
        assert!(account.source.is_none());
        assert!(!account.has_children());
    }

    #[test]
    fn test_structural_node_merges_with_later_source() {
        let mut migrator = Migrator::new();
        let inputs = vec![
            Migrateable::text("Lead", "Id\n"),
            Migrateable::text("Account", "Id\n"),
        ];

        migrator.build(&inputs, &catalog(), "crm", "User").unwrap();

        let names: Vec<_> = migrator.nodes().map(|n| n.name.clone()).collect();
        assert_eq!(names, vec!["Lead", "Account", "Contact"]);
        let account = migrator.node("Account").unwrap();
        assert!(account.source.is_some());
        assert!(account.depends_on("Contact"));
    }

    #[test]
    fn test_identity_source_without_module_is_skipped() {
        let schemas = SchemaCatalog::new(vec![Schema::new(1, "crm", "Account")]);
        let mut migrator = Migrator::new();
        let inputs = vec![
            Migrateable::text("User", "Id\n"),
            Migrateable::text("Account", "Id\n"),
        ];

        migrator.build(&inputs, &schemas, "crm", "User").unwrap();
        assert_eq!(migrator.len(), 1);
    }

    #[test]
    fn test_second_source_for_entity_fails() {
        let mut migrator = Migrator::new();
        let inputs = vec![
            Migrateable::text("Lead", "Id\n"),
            Migrateable::text("Account", "Id,Name\n001,Acme\n"),
            Migrateable::text("Account", "Id,Name\n002,Globex\n"),
        ];

        let err = migrator.build(&inputs, &catalog(), "crm", "User").unwrap_err();
        assert!(matches!(err, MigrateError::Config(ref msg) if msg.contains("'Account'")));
    }

    #[test]
    fn test_unknown_module_fails() {
        let mut migrator = Migrator::new();
        let inputs = vec![Migrateable::text("Invoice", "Id\n")];

        let err = migrator.build(&inputs, &catalog(), "crm", "User").unwrap_err();
        assert!(matches!(err, MigrateError::SchemaNotFound { .. }));
    }

    #[test]
    fn test_reference_without_target_fails() {
        let schemas = SchemaCatalog::new(vec![
            Schema::new(1, "crm", "Account").with_field(FieldDefinition::new("ParentId", FieldKind::Record)),
        ]);
        let mut migrator = Migrator::new();
        let inputs = vec![Migrateable::text("Account", "Id\n")];

        let err = migrator.build(&inputs, &schemas, "crm", "User").unwrap_err();
        assert!(matches!(err, MigrateError::MissingReference { .. }));
    }
}
