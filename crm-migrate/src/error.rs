//! Error types for the migration engine
//!
//! Every variant is fatal for the run: the migrator stops at the first error
//! and hands it back to the caller of [`crate::migrate`].

use std::fmt;

/// Failure reported by a record or identity store
#[derive(Debug)]
pub struct StoreError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error with a short description of what failed
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Errors raised while building or executing a migration
#[derive(Debug)]
pub enum MigrateError {
    /// No schema registered under the given handle or id
    SchemaNotFound { namespace: String, key: String },
    /// A reference field declares no target entity
    MissingReference { entity: String, field: String },
    /// A reference field's target cannot be parsed as an identifier
    InvalidReferenceFormat {
        entity: String,
        field: String,
        value: String,
    },
    /// Malformed row or I/O failure while streaming a source
    SourceRead { entity: String, source: csv::Error },
    /// A timestamp cell did not match the configured format
    DateParse {
        entity: String,
        /// External id (first column) of the offending row
        row: String,
        column: String,
        value: String,
        source: chrono::ParseError,
    },
    /// Record or identity store failure
    Store { entity: String, source: StoreError },
    /// The worklist ran dry while these nodes were still waiting on dependencies
    InconsistentGraph { pending: Vec<String> },
    /// Invalid or unreadable configuration
    Config(String),
}

impl MigrateError {
    pub fn store(entity: impl Into<String>, source: StoreError) -> Self {
        MigrateError::Store {
            entity: entity.into(),
            source,
        }
    }

    pub fn source_read(entity: impl Into<String>, source: csv::Error) -> Self {
        MigrateError::SourceRead {
            entity: entity.into(),
            source,
        }
    }
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrateError::SchemaNotFound { namespace, key } => {
                write!(f, "Module '{}' not found in namespace '{}'", key, namespace)
            }
            MigrateError::MissingReference { entity, field } => {
                write!(
                    f,
                    "Reference field '{}.{}' does not declare a target module",
                    entity, field
                )
            }
            MigrateError::InvalidReferenceFormat {
                entity,
                field,
                value,
            } => {
                write!(
                    f,
                    "Reference field '{}.{}' has an invalid target module id: {}",
                    entity, field, value
                )
            }
            MigrateError::SourceRead { entity, source } => {
                write!(f, "Failed to read source for '{}': {}", entity, source)
            }
            MigrateError::DateParse {
                entity,
                row,
                column,
                value,
                ..
            } => {
                write!(
                    f,
                    "Invalid timestamp '{}' in column '{}' of '{}' row '{}'",
                    value, column, entity, row
                )
            }
            MigrateError::Store { entity, source } => {
                write!(f, "Store failure while migrating '{}': {}", entity, source)
            }
            MigrateError::InconsistentGraph { pending } => {
                write!(
                    f,
                    "Migration graph is inconsistent, unsatisfied nodes remain: {}",
                    pending.join(", ")
                )
            }
            MigrateError::Config(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for MigrateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrateError::SourceRead { source, .. } => Some(source),
            MigrateError::DateParse { source, .. } => Some(source),
            MigrateError::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
