//! Dependency-ordered migration of CSV exports into a CRM record store
//!
//! A run has three phases:
//! 1. the identity entity is migrated up front, producing an [`IdentityMap`]
//! 2. every source becomes a node of a [`Migrator`] graph whose edges follow
//!    the `Record` fields of the module schemas; cycles are spliced out
//! 3. nodes are executed leaf first, so every referenced record has a target
//!    id by the time a record pointing at it is written

pub mod config;
pub mod error;
pub mod graph;
pub mod identity;
pub mod node;
pub mod record;
pub mod report;
pub mod schema;
pub mod source;
pub mod store;

pub use config::{IdentityColumns, MigrateConfig, SourceConfig};
pub use error::{MigrateError, Result, StoreError};
pub use graph::Migrator;
pub use identity::{migrate_identities, Identity, IdentityMap, IdentityStore};
pub use node::Node;
pub use record::{IdMap, Record, RecordStore, Value};
pub use report::MigrationReport;
pub use schema::{FieldDefinition, FieldKind, Schema, SchemaCatalog, SchemaProvider};
pub use source::{Migrateable, SourceInput, TabularSource};

/// Run a complete migration
///
/// The source named after `config.identity_entity` feeds the identity
/// pre-pass; when it is absent every identity reference stays unresolved.
/// The first error aborts the run, nothing written so far is rolled back.
pub fn migrate(
    config: &MigrateConfig,
    inputs: &[Migrateable],
    schemas: &dyn SchemaProvider,
    identity_store: &mut dyn IdentityStore,
    records: &mut dyn RecordStore,
) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    let identities = match inputs.iter().find(|m| m.name == config.identity_entity) {
        Some(input) => {
            let mut source = input.open()?;
            migrate_identities(
                &mut source,
                identity_store,
                &config.identity_columns,
                &config.date_format,
            )?
        }
        None => {
            log::warn!(
                "No source for identity entity '{}', identity references will stay empty",
                config.identity_entity
            );
            IdentityMap::new()
        }
    };
    report.identities = identities.len();

    let mut migrator = Migrator::new();
    migrator.build(inputs, schemas, &config.namespace, &config.identity_entity)?;

    log::info!("Removing cycles");
    report.spliced = migrator.make_acyclic();
    report.nodes = migrator.len();
    report.entry_points = migrator.collect_leafs();

    log::info!("Migration prepared");
    log::info!("No. of nodes {}", report.nodes);
    log::info!("No. of entry points {}", report.entry_points);

    migrator.execute(records, &identities, &config.identity_entity, &mut report)?;

    log::info!(
        "Migration finished: {} records across {} nodes",
        report.total_records(),
        report.order.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryIdentityStore, MemoryRecordStore};

    fn config() -> MigrateConfig {
        MigrateConfig {
            namespace: "crm".to_string(),
            ..Default::default()
        }
    }

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            Schema::new(1, "crm", "Account")
                .with_field(FieldDefinition::new("Name", FieldKind::String))
                .with_field(FieldDefinition::record("PrimaryContactId", 2))
                .with_field(FieldDefinition::new("OwnerId", FieldKind::User)),
            Schema::new(2, "crm", "Contact")
                .with_field(FieldDefinition::new("LastName", FieldKind::String))
                .with_field(FieldDefinition::record("AccountId", 1)),
            Schema::new(3, "crm", "Opportunity")
                .with_field(FieldDefinition::record("AccountId", 1))
                .with_field(FieldDefinition::record("ContactId", 2)),
        ])
    }

    const USERS: &str = "Id,Username,Email,FirstName,LastName,IsDeleted\n005A,jdoe,jdoe@example.com,Jane,Doe,\n005B,gone,gone@example.com,Old,User,1\n";

    #[test]
    fn test_mutual_references_resolve_one_direction() {
        let inputs = vec![
            Migrateable::text("User", USERS),
            Migrateable::text("Account", "Id,Name,PrimaryContactId,OwnerId\n001,Acme,003,005A\n"),
            Migrateable::text("Contact", "Id,LastName,AccountId\n003,Doe,001\n"),
        ];
        let mut identities = MemoryIdentityStore::new();
        let mut records = MemoryRecordStore::new();

        let report = migrate(&config(), &inputs, &catalog(), &mut identities, &mut records).unwrap();

        // Account -> Contact was discovered first, so Contact -> Account is spliced
        assert_eq!(report.spliced, vec![("Contact".to_string(), "Account".to_string())]);
        assert_eq!(report.order, vec!["Contact", "Account"]);

        let contact = records.find("Contact", "003").unwrap();
        assert_eq!(contact.get("AccountId"), Some(&Value::Null));

        let account = records.find("Account", "001").unwrap();
        assert_eq!(account.get("PrimaryContactId"), Some(&Value::Ref(contact.id.unwrap())));
        let owner = identities.find_by_contact("jdoe@example.com").unwrap().unwrap();
        assert_eq!(account.get("OwnerId"), Some(&Value::Ref(owner.id)));

        assert_eq!(report.identities, 1);
        assert_eq!(report.unresolved, 1);
    }

    #[test]
    fn test_dependency_chain_order() {
        let inputs = vec![
            Migrateable::text("Opportunity", "Id,AccountId,ContactId\n006,001,003\n"),
            Migrateable::text("Contact", "Id,LastName,AccountId\n003,Doe,\n"),
        ];
        let schemas = SchemaCatalog::new(vec![
            Schema::new(1, "crm", "Account"),
            Schema::new(2, "crm", "Contact").with_field(FieldDefinition::record("AccountId", 1)),
            Schema::new(3, "crm", "Opportunity")
                .with_field(FieldDefinition::record("AccountId", 1))
                .with_field(FieldDefinition::record("ContactId", 2)),
        ]);
        let mut records = MemoryRecordStore::new();

        let report = migrate(
            &config(),
            &inputs,
            &schemas,
            &mut MemoryIdentityStore::new(),
            &mut records,
        )
        .unwrap();

        assert_eq!(report.order, vec!["Account", "Contact", "Opportunity"]);
        assert_eq!(report.nodes, 3);
        assert_eq!(report.entry_points, 1);

        let contact_id = records.find("Contact", "003").unwrap().id.unwrap();
        let opportunity = records.find("Opportunity", "006").unwrap();
        assert_eq!(opportunity.get("ContactId"), Some(&Value::Ref(contact_id)));
        // Account has no source, so nothing to point at
        assert_eq!(opportunity.get("AccountId"), Some(&Value::Null));
    }

    #[test]
    fn test_records_are_written_after_their_dependencies() {
        let inputs = vec![
            Migrateable::text("Opportunity", "Id,AccountId,ContactId\n006,001,003\n007,002,004\n"),
            Migrateable::text("Contact", "Id,LastName,AccountId\n003,Doe,001\n004,Roe,002\n"),
            Migrateable::text("Account", "Id,Name,PrimaryContactId\n001,Acme,\n002,Globex,\n"),
        ];
        let mut records = MemoryRecordStore::new();

        migrate(
            &config(),
            &inputs,
            &catalog(),
            &mut MemoryIdentityStore::new(),
            &mut records,
        )
        .unwrap();

        let entities: Vec<&str> = records.writes().iter().map(|(e, _)| e.as_str()).collect();
        let last_contact = entities.iter().rposition(|e| *e == "Contact").unwrap();
        let first_opportunity = entities.iter().position(|e| *e == "Opportunity").unwrap();
        assert!(last_contact < first_opportunity);
        assert!(records
            .records("Opportunity")
            .iter()
            .all(|r| r.get("ContactId").is_some_and(|v| !v.is_null())));
    }

    #[test]
    fn test_identity_source_is_optional() {
        let inputs = vec![Migrateable::text("Account", "Id,Name,OwnerId\n001,Acme,005A\n")];
        let schemas = SchemaCatalog::new(vec![Schema::new(1, "crm", "Account")
            .with_field(FieldDefinition::new("Name", FieldKind::String))
            .with_field(FieldDefinition::new("OwnerId", FieldKind::User))]);
        let mut records = MemoryRecordStore::new();

        let report = migrate(
            &config(),
            &inputs,
            &schemas,
            &mut MemoryIdentityStore::new(),
            &mut records,
        )
        .unwrap();

        assert_eq!(report.identities, 0);
        assert_eq!(records.find("Account", "001").unwrap().get("OwnerId"), Some(&Value::Null));
    }

    #[test]
    fn test_second_source_for_entity_is_rejected() {
        let inputs = vec![
            Migrateable::text("Account", "Id,Name\n001,Acme\n"),
            Migrateable::text("Account", "Id,Name\n002,Globex\n"),
        ];
        let mut records = MemoryRecordStore::new();

        let err = migrate(
            &config(),
            &inputs,
            &catalog(),
            &mut MemoryIdentityStore::new(),
            &mut records,
        )
        .unwrap_err();

        assert!(matches!(err, MigrateError::Config(_)));
        assert!(records.writes().is_empty());
    }

    #[test]
    fn test_first_store_error_aborts_the_run() {
        let inputs = vec![
            Migrateable::text("Contact", "Id,LastName,AccountId\n003,Doe,001\n"),
            Migrateable::text("Account", "Id,Name,PrimaryContactId\n001,Acme,\n"),
        ];
        let mut records = MemoryRecordStore::new();
        records.fail_on("Account");

        let err = migrate(
            &config(),
            &inputs,
            &catalog(),
            &mut MemoryIdentityStore::new(),
            &mut records,
        )
        .unwrap_err();

        assert!(matches!(err, MigrateError::Store { ref entity, .. } if entity == "Account"));
        assert!(records.records("Contact").is_empty());
    }
}
