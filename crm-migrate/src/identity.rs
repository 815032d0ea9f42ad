//! Identity pre-pass
//!
//! Users are migrated before anything else so that every owner/author style
//! field in the other entities can be resolved through the resulting
//! [`IdentityMap`].

use std::collections::HashMap;

use chrono::NaiveDateTime;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::config::IdentityColumns;
use crate::error::{MigrateError, Result, StoreError};
use crate::source::TabularSource;

/// External identifier -> target identity id
pub type IdentityMap = HashMap<String, u64>;

/// A user/account of the target system
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// Assigned by the store on create
    pub id: u64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Looks up and creates identities in the target system
pub trait IdentityStore {
    /// Find an identity by its contact (email) address
    fn find_by_contact(&self, address: &str) -> std::result::Result<Option<Identity>, StoreError>;

    /// Create an identity, returning it with its assigned id
    fn create(&mut self, identity: Identity) -> std::result::Result<Identity, StoreError>;
}

/// Column positions resolved once from the header
struct ColumnIndex {
    username: Option<usize>,
    email: Option<usize>,
    first_name: Option<usize>,
    last_name: Option<usize>,
    created_at: Option<usize>,
    updated_at: Option<usize>,
    deleted: Option<usize>,
}

impl ColumnIndex {
    fn resolve(source: &TabularSource, columns: &IdentityColumns) -> Self {
        Self {
            username: source.column(&columns.username),
            email: source.column(&columns.email),
            first_name: source.column(&columns.first_name),
            last_name: source.column(&columns.last_name),
            created_at: source.column(&columns.created_at),
            updated_at: source.column(&columns.updated_at),
            deleted: source.column(&columns.deleted),
        }
    }
}

fn cell<'r>(row: &'r StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| row.get(i)).map(str::trim).unwrap_or("")
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn parse_timestamp(
    entity: &str,
    row: &str,
    column: &str,
    value: &str,
    format: &str,
) -> Result<Option<NaiveDateTime>> {
    if value.is_empty() {
        return Ok(None);
    }

    NaiveDateTime::parse_from_str(value, format)
        .map(Some)
        .map_err(|source| MigrateError::DateParse {
            entity: entity.to_string(),
            row: row.to_string(),
            column: column.to_string(),
            value: value.to_string(),
            source,
        })
}

/// Migrate every identity row, reusing identities that already exist
///
/// Rows flagged as deleted are skipped. The first column of each row is the
/// external identifier the returned map is keyed by. Reused and newly
/// created identities are not distinguished.
pub fn migrate_identities(
    source: &mut TabularSource,
    store: &mut dyn IdentityStore,
    columns: &IdentityColumns,
    date_format: &str,
) -> Result<IdentityMap> {
    let entity = source.entity().to_string();
    let index = ColumnIndex::resolve(source, columns);
    let mut mapping = IdentityMap::new();
    let mut created = 0usize;
    let mut skipped = 0usize;

    while let Some(row) = source.next_row()? {
        if is_truthy(cell(&row, index.deleted)) {
            skipped += 1;
            continue;
        }

        let row_id = cell(&row, Some(0));
        let name = [cell(&row, index.first_name), cell(&row, index.last_name)]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        let identity = Identity {
            id: 0,
            username: cell(&row, index.username).to_string(),
            email: cell(&row, index.email).to_string(),
            name,
            created_at: parse_timestamp(
                &entity,
                row_id,
                &columns.created_at,
                cell(&row, index.created_at),
                date_format,
            )?,
            updated_at: parse_timestamp(
                &entity,
                row_id,
                &columns.updated_at,
                cell(&row, index.updated_at),
                date_format,
            )?,
        };

        let existing = if identity.email.is_empty() {
            None
        } else {
            store
                .find_by_contact(&identity.email)
                .map_err(|e| MigrateError::store(&entity, e))?
        };

        let resolved = match existing {
            Some(found) => found,
            None => {
                created += 1;
                store
                    .create(identity)
                    .map_err(|e| MigrateError::store(&entity, e))?
            }
        };

        if row_id.is_empty() {
            log::warn!("Identity row without an external id ({})", resolved.email);
            continue;
        }
        mapping.insert(row_id.to_string(), resolved.id);
    }

    log::info!(
        "Identities migrated from '{}': {} mapped, {} created, {} deleted rows skipped",
        entity,
        mapping.len(),
        created,
        skipped
    );

    Ok(mapping)
}
