//! Module schemas and the provider the migrator resolves them through

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Option key holding the referenced module id on `Record` fields
pub const MODULE_ID_OPTION: &str = "module_id";

/// Field kinds known to the migrator
///
/// Only `Record` and `User` change how a value is migrated; every other
/// kind is copied through as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    String,
    Number,
    Bool,
    DateTime,
    Email,
    /// Reference to a record of another (or the same) module
    Record,
    /// Reference to an identity (user/account) of the target system
    User,
    Other(String),
}

impl From<String> for FieldKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "String" => FieldKind::String,
            "Number" => FieldKind::Number,
            "Bool" => FieldKind::Bool,
            "DateTime" => FieldKind::DateTime,
            "Email" => FieldKind::Email,
            "Record" => FieldKind::Record,
            "User" => FieldKind::User,
            _ => FieldKind::Other(value),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::String => "String".to_string(),
            FieldKind::Number => "Number".to_string(),
            FieldKind::Bool => "Bool".to_string(),
            FieldKind::DateTime => "DateTime".to_string(),
            FieldKind::Email => "Email".to_string(),
            FieldKind::Record => "Record".to_string(),
            FieldKind::User => "User".to_string(),
            FieldKind::Other(name) => name,
        }
    }
}

/// A single field of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            options: serde_json::Map::new(),
        }
    }

    /// Build a `Record` field pointing at the module with the given id
    pub fn record(name: impl Into<String>, module_id: u64) -> Self {
        let mut field = Self::new(name, FieldKind::Record);
        field.options.insert(
            MODULE_ID_OPTION.to_string(),
            serde_json::Value::String(module_id.to_string()),
        );
        field
    }

    pub fn is_record_reference(&self) -> bool {
        self.kind == FieldKind::Record
    }

    /// Id of the module a `Record` field points at
    ///
    /// `entity` is only used to describe the failure.
    pub fn reference_target(&self, entity: &str) -> Result<u64> {
        let invalid = |value: String| MigrateError::InvalidReferenceFormat {
            entity: entity.to_string(),
            field: self.name.clone(),
            value,
        };

        match self.options.get(MODULE_ID_OPTION) {
            None | Some(serde_json::Value::Null) => Err(MigrateError::MissingReference {
                entity: entity.to_string(),
                field: self.name.clone(),
            }),
            Some(serde_json::Value::String(raw)) => {
                raw.trim().parse::<u64>().map_err(|_| invalid(raw.clone()))
            }
            Some(serde_json::Value::Number(n)) => n.as_u64().ok_or_else(|| invalid(n.to_string())),
            Some(other) => Err(invalid(other.to_string())),
        }
    }
}

/// Field metadata for one module (entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: u64,
    pub namespace: String,
    pub handle: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl Schema {
    pub fn new(id: u64, namespace: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id,
            namespace: namespace.into(),
            handle: handle.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn record_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_record_reference())
    }
}

/// Resolves module schemas by handle or id within a namespace
pub trait SchemaProvider {
    fn find_by_handle(&self, namespace: &str, handle: &str) -> Result<Schema>;
    fn find_by_id(&self, namespace: &str, id: u64) -> Result<Schema>;
}

/// Schema provider backed by a static list of modules
///
/// ```toml
/// [[modules]]
/// id = 2
/// namespace = "crm"
/// handle = "Contact"
///
/// [[modules.fields]]
/// name = "AccountId"
/// kind = "Record"
/// options = { module_id = "1" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub modules: Vec<Schema>,
}

impl SchemaCatalog {
    pub fn new(modules: Vec<Schema>) -> Self {
        Self { modules }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MigrateError::Config(format!("invalid schema catalog: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_toml(&content)?;
        log::debug!(
            "Loaded {} modules from {}",
            catalog.modules.len(),
            path.display()
        );
        Ok(catalog)
    }
}

impl SchemaProvider for SchemaCatalog {
    fn find_by_handle(&self, namespace: &str, handle: &str) -> Result<Schema> {
        self.modules
            .iter()
            .find(|m| m.namespace == namespace && m.handle == handle)
            .cloned()
            .ok_or_else(|| MigrateError::SchemaNotFound {
                namespace: namespace.to_string(),
                key: handle.to_string(),
            })
    }

    fn find_by_id(&self, namespace: &str, id: u64) -> Result<Schema> {
        self.modules
            .iter()
            .find(|m| m.namespace == namespace && m.id == id)
            .cloned()
            .ok_or_else(|| MigrateError::SchemaNotFound {
                namespace: namespace.to_string(),
                key: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[modules]]
        id = 1
        namespace = "crm"
        handle = "Account"

        [[modules.fields]]
        name = "Name"
        kind = "String"

        [[modules]]
        id = 2
        namespace = "crm"
        handle = "Contact"

        [[modules.fields]]
        name = "AccountId"
        kind = "Record"
        options = { module_id = "1" }

        [[modules.fields]]
        name = "OwnerId"
        kind = "User"
    "#;

    #[test]
    fn test_catalog_lookup_by_handle_and_id() {
        let catalog = SchemaCatalog::from_toml(CATALOG).unwrap();

        let contact = catalog.find_by_handle("crm", "Contact").unwrap();
        assert_eq!(contact.id, 2);
        assert_eq!(contact.field("OwnerId").unwrap().kind, FieldKind::User);

        let account = catalog.find_by_id("crm", 1).unwrap();
        assert_eq!(account.handle, "Account");
    }

    #[test]
    fn test_catalog_is_namespace_scoped() {
        let catalog = SchemaCatalog::from_toml(CATALOG).unwrap();

        let err = catalog.find_by_handle("sales", "Contact").unwrap_err();
        assert!(matches!(err, MigrateError::SchemaNotFound { .. }));
    }

    #[test]
    fn test_reference_target_parses_module_id() {
        let catalog = SchemaCatalog::from_toml(CATALOG).unwrap();
        let contact = catalog.find_by_handle("crm", "Contact").unwrap();

        let refs: Vec<_> = contact.record_fields().collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].reference_target("Contact").unwrap(), 1);
    }

    #[test]
    fn test_reference_without_target_is_missing() {
        let field = FieldDefinition::new("ParentId", FieldKind::Record);

        let err = field.reference_target("Account").unwrap_err();
        assert!(matches!(err, MigrateError::MissingReference { .. }));
    }

    #[test]
    fn test_reference_with_unparsable_target_is_invalid() {
        let mut field = FieldDefinition::new("ParentId", FieldKind::Record);
        field.options.insert(
            MODULE_ID_OPTION.to_string(),
            serde_json::Value::String("account".to_string()),
        );
        let err = field.reference_target("Account").unwrap_err();
        assert!(matches!(err, MigrateError::InvalidReferenceFormat { .. }));

        field
            .options
            .insert(MODULE_ID_OPTION.to_string(), serde_json::Value::Bool(true));
        let err = field.reference_target("Account").unwrap_err();
        assert!(matches!(err, MigrateError::InvalidReferenceFormat { .. }));
    }

    #[test]
    fn test_unknown_kind_round_trips_as_other() {
        let kind = FieldKind::from("Geometry".to_string());
        assert_eq!(kind, FieldKind::Other("Geometry".to_string()));
        assert_eq!(String::from(kind), "Geometry");
    }
}
