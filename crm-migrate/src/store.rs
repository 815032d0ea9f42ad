//! Record and identity stores shipped with the tool
//!
//! The in-memory stores back `--dry-run` and the tests; the CSV store writes
//! one output file per entity.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::error::StoreError;
use crate::identity::{Identity, IdentityStore};
use crate::record::{Record, RecordStore};

/// Identity store held in memory with sequential ids
#[derive(Debug)]
pub struct MemoryIdentityStore {
    identities: Vec<Identity>,
    next_id: u64,
    failure: Option<String>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            identities: Vec::new(),
            next_id: 1,
            failure: None,
        }
    }

    /// Make every subsequent `create` fail with the given message
    pub fn fail_on_create(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    pub fn get(&self, id: u64) -> Option<&Identity> {
        self.identities.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Export all identities as CSV
    pub fn write_csv(&self, path: &Path) -> Result<(), StoreError> {
        let mut wtr = Writer::from_path(path)
            .map_err(|e| StoreError::with_source(format!("failed to create {}", path.display()), e))?;

        wtr.write_record(["id", "username", "email", "name", "created_at", "updated_at"])
            .map_err(|e| StoreError::with_source("failed to write identity header", e))?;

        for identity in &self.identities {
            let created = identity.created_at.map(|t| t.to_string()).unwrap_or_default();
            let updated = identity.updated_at.map(|t| t.to_string()).unwrap_or_default();
            wtr.write_record([
                identity.id.to_string(),
                identity.username.clone(),
                identity.email.clone(),
                identity.name.clone(),
                created,
                updated,
            ])
            .map_err(|e| StoreError::with_source("failed to write identity", e))?;
        }

        wtr.flush()
            .map_err(|e| StoreError::with_source("failed to flush identity export", e))?;

        log::info!("Exported {} identities to {}", self.identities.len(), path.display());
        Ok(())
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn find_by_contact(&self, address: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .identities
            .iter()
            .find(|i| i.email.eq_ignore_ascii_case(address))
            .cloned())
    }

    fn create(&mut self, mut identity: Identity) -> Result<Identity, StoreError> {
        if let Some(message) = &self.failure {
            return Err(StoreError::new(message.clone()));
        }

        identity.id = self.next_id;
        self.next_id += 1;
        self.identities.push(identity.clone());
        Ok(identity)
    }
}

/// Record store held in memory; remembers the order records were written in
#[derive(Debug)]
pub struct MemoryRecordStore {
    records: HashMap<String, Vec<Record>>,
    writes: Vec<(String, u64)>,
    next_id: u64,
    failing_entity: Option<String>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            writes: Vec::new(),
            next_id: 1,
            failing_entity: None,
        }
    }

    /// Reject every write for `entity`
    pub fn fail_on(&mut self, entity: impl Into<String>) {
        self.failing_entity = Some(entity.into());
    }

    pub fn records(&self, entity: &str) -> &[Record] {
        self.records.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a written record by its source id
    pub fn find(&self, entity: &str, source_id: &str) -> Option<&Record> {
        self.records(entity).iter().find(|r| r.source_id == source_id)
    }

    /// (entity, id) of every write, in write order
    pub fn writes(&self) -> &[(String, u64)] {
        &self.writes
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&mut self, entity: &str, mut record: Record) -> Result<Record, StoreError> {
        if self.failing_entity.as_deref() == Some(entity) {
            return Err(StoreError::new(format!("writes to '{}' are rejected", entity)));
        }

        let id = self.next_id;
        self.next_id += 1;
        record.id = Some(id);

        self.writes.push((entity.to_string(), id));
        self.records
            .entry(entity.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }
}

struct EntityWriter {
    writer: Writer<File>,
    columns: Vec<String>,
}

/// Writes records to `<output_dir>/<entity>.csv`
///
/// The column layout of each file is fixed by the first record written for
/// that entity: `id`, `source_id`, then the record's fields.
pub struct CsvRecordStore {
    output_dir: PathBuf,
    writers: HashMap<String, EntityWriter>,
    next_id: u64,
}

impl CsvRecordStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            StoreError::with_source(format!("failed to create {}", output_dir.display()), e)
        })?;

        Ok(Self {
            output_dir,
            writers: HashMap::new(),
            next_id: 1,
        })
    }

    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", entity))
    }

    fn writer_for(&mut self, entity: &str, record: &Record) -> Result<&mut EntityWriter, StoreError> {
        if !self.writers.contains_key(entity) {
            let path = self.path_for(entity);
            let mut writer = Writer::from_path(&path).map_err(|e| {
                StoreError::with_source(format!("failed to create {}", path.display()), e)
            })?;

            let columns: Vec<String> = record.fields.iter().map(|(name, _)| name.clone()).collect();
            let mut header = vec!["id".to_string(), "source_id".to_string()];
            header.extend(columns.iter().cloned());
            writer
                .write_record(&header)
                .map_err(|e| StoreError::with_source("failed to write CSV header", e))?;

            log::debug!("Writing '{}' records to {}", entity, path.display());
            self.writers
                .insert(entity.to_string(), EntityWriter { writer, columns });
        }

        self.writers
            .get_mut(entity)
            .ok_or_else(|| StoreError::new(format!("no writer for '{}'", entity)))
    }

    /// Flush every open file
    pub fn flush(&mut self) -> Result<(), StoreError> {
        for (entity, w) in &mut self.writers {
            w.writer.flush().map_err(|e| {
                StoreError::with_source(format!("failed to flush '{}' output", entity), e)
            })?;
        }
        Ok(())
    }
}

impl RecordStore for CsvRecordStore {
    fn create(&mut self, entity: &str, mut record: Record) -> Result<Record, StoreError> {
        let id = self.next_id;
        let w = self.writer_for(entity, &record)?;

        let mut row = vec![id.to_string(), record.source_id.clone()];
        row.extend(
            w.columns
                .iter()
                .map(|c| record.get(c).map(|v| v.to_cell()).unwrap_or_default()),
        );
        w.writer
            .write_record(&row)
            .map_err(|e| StoreError::with_source(format!("failed to write '{}' record", entity), e))?;

        self.next_id += 1;
        record.id = Some(id);
        Ok(record)
    }
}
