//! Tabular (CSV) sources: a header row followed by data rows

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;

use csv::{Reader, ReaderBuilder, StringRecord};

use crate::error::{MigrateError, Result};

/// Where an entity's rows come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceInput {
    File(PathBuf),
    /// Inline CSV text
    Text(String),
}

/// An entity together with the source its records are read from
#[derive(Debug, Clone, PartialEq)]
pub struct Migrateable {
    pub name: String,
    pub input: SourceInput,
}

impl Migrateable {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            input: SourceInput::File(path.into()),
        }
    }

    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: SourceInput::Text(content.into()),
        }
    }

    /// Open a fresh reader positioned at the header row
    ///
    /// Each call starts from the beginning, so the identity source can be
    /// read once for the pre-pass and again as a regular entity.
    pub fn open(&self) -> Result<TabularSource> {
        let reader: Box<dyn Read> = match &self.input {
            SourceInput::File(path) => {
                let file = File::open(path)
                    .map_err(|e| MigrateError::source_read(&self.name, csv::Error::from(e)))?;
                Box::new(BufReader::new(file))
            }
            SourceInput::Text(content) => Box::new(Cursor::new(content.clone().into_bytes())),
        };
        TabularSource::new(&self.name, reader)
    }
}

/// Streaming CSV reader that has already consumed the header row
pub struct TabularSource {
    entity: String,
    reader: Reader<Box<dyn Read>>,
    header: Vec<String>,
}

impl TabularSource {
    pub fn new(entity: &str, input: Box<dyn Read>) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_reader(input);

        let mut first = StringRecord::new();
        let has_header = reader
            .read_record(&mut first)
            .map_err(|e| MigrateError::source_read(entity, e))?;

        if !has_header {
            log::warn!("Source for '{}' is empty", entity);
        }

        Ok(Self {
            entity: entity.to_string(),
            reader,
            header: first.iter().map(|h| h.trim().to_string()).collect(),
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Column index of a header name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Next data row, `None` at end of stream
    pub fn next_row(&mut self) -> Result<Option<StringRecord>> {
        let mut row = StringRecord::new();
        match self.reader.read_record(&mut row) {
            Ok(true) => Ok(Some(row)),
            Ok(false) => Ok(None),
            Err(e) => Err(MigrateError::source_read(&self.entity, e)),
        }
    }
}

impl fmt::Debug for TabularSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularSource")
            .field("entity", &self.entity)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
