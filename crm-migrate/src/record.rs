//! Records written to the target store and the ids they are assigned

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A resolved field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Empty cell or a reference that could not be resolved
    Null,
    String(String),
    /// Target id of a referenced record or identity
    Ref(u64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_ref_id(&self) -> Option<u64> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Text form used by the CSV output
    pub fn to_cell(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Ref(id) => id.to_string(),
        }
    }
}

/// A fully resolved record ready to be persisted
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Assigned by the store on create
    pub id: Option<u64>,
    /// Identifier of the row in the source export (first column)
    pub source_id: String,
    /// Field values in source column order
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            id: None,
            source_id: source_id.into(),
            fields: Vec::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Persists resolved records
pub trait RecordStore {
    /// Persist a record of `entity`, returning it with its assigned id
    fn create(&mut self, entity: &str, record: Record) -> Result<Record, StoreError>;
}

/// Source id -> target id, per entity
///
/// Filled as records are written so later rows can resolve references to
/// anything already migrated, including earlier rows of the same entity.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entities: HashMap<String, HashMap<String, u64>>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: &str, source_id: &str, target_id: u64) {
        self.entities
            .entry(entity.to_string())
            .or_default()
            .insert(source_id.to_string(), target_id);
    }

    pub fn resolve(&self, entity: &str, source_id: &str) -> Option<u64> {
        self.entities.get(entity)?.get(source_id).copied()
    }

    /// Number of mapped records for an entity
    pub fn len(&self, entity: &str) -> usize {
        self.entities.get(entity).map_or(0, |m| m.len())
    }
}
