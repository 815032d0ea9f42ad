//! Migration configuration
//!
//! Loaded from TOML, by default `~/.config/crm-migrate/config.toml`.
//! Command line flags are layered on top by the binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Timestamp layout used by the historical CSV exports
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Handle of the identity entity migrated ahead of the graph
pub const DEFAULT_IDENTITY_ENTITY: &str = "User";

/// Top-level migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Namespace the modules are looked up in
    pub namespace: String,
    /// Entity migrated in the identity pre-pass
    pub identity_entity: String,
    /// chrono format string for identity timestamps
    pub date_format: String,
    /// Path of the schema catalog (TOML)
    pub schema: Option<PathBuf>,
    /// Directory the CSV record store writes into
    pub output_dir: Option<PathBuf>,
    pub identity_columns: IdentityColumns,
    pub sources: Vec<SourceConfig>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            identity_entity: DEFAULT_IDENTITY_ENTITY.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            schema: None,
            output_dir: None,
            identity_columns: IdentityColumns::default(),
            sources: Vec::new(),
        }
    }
}

/// Header names the identity pre-pass reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityColumns {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted: String,
}

impl Default for IdentityColumns {
    fn default() -> Self {
        Self {
            username: "Username".to_string(),
            email: "Email".to_string(),
            first_name: "FirstName".to_string(),
            last_name: "LastName".to_string(),
            created_at: "CreatedDate".to_string(),
            updated_at: "LastModifiedDate".to_string(),
            deleted: "IsDeleted".to_string(),
        }
    }
}

/// One entity source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub entity: String,
    pub path: PathBuf,
}

impl SourceConfig {
    /// Parse a `Entity=path/to/file.csv` pair as given on the command line
    pub fn parse_pair(pair: &str) -> Result<Self> {
        let (entity, path) = pair.split_once('=').ok_or_else(|| {
            MigrateError::Config(format!("expected ENTITY=PATH, got '{}'", pair))
        })?;

        let entity = entity.trim();
        let path = path.trim();
        if entity.is_empty() || path.is_empty() {
            return Err(MigrateError::Config(format!(
                "expected ENTITY=PATH, got '{}'",
                pair
            )));
        }

        Ok(Self {
            entity: entity.to_string(),
            path: PathBuf::from(path),
        })
    }
}

impl MigrateConfig {
    /// Default config file location (~/.config/crm-migrate/config.toml)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crm-migrate")
            .join("config.toml")
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MigrateError::Config(e.to_string()))
    }

    /// Load a config file; relative source and schema paths resolve against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }

        log::debug!(
            "Loaded config from {} ({} sources)",
            path.display(),
            config.sources.len()
        );
        Ok(config)
    }

    /// Load the default config file if present, otherwise fall back to defaults
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn rebase(&mut self, base: &Path) {
        let resolve = |p: &PathBuf| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.clone()
            }
        };

        self.schema = self.schema.as_ref().map(resolve);
        self.output_dir = self.output_dir.as_ref().map(resolve);
        for source in &mut self.sources {
            source.path = resolve(&source.path);
        }
    }

    /// Check the settings the migration cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(MigrateError::Config("namespace is not set".to_string()));
        }
        if self.identity_entity.trim().is_empty() {
            return Err(MigrateError::Config("identity_entity is empty".to_string()));
        }
        if self.sources.is_empty() {
            return Err(MigrateError::Config("no sources configured".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.entity.as_str()) {
                return Err(MigrateError::Config(format!(
                    "more than one source given for '{}'",
                    source.entity
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = MigrateConfig::from_toml("namespace = \"crm\"").unwrap();

        assert_eq!(config.namespace, "crm");
        assert_eq!(config.identity_entity, "User");
        assert_eq!(config.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(config.identity_columns.deleted, "IsDeleted");
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_sources_and_custom_columns() {
        let config = MigrateConfig::from_toml(
            r#"
            namespace = "crm"
            identity_entity = "Owner"

            [identity_columns]
            email = "EmailAddress"

            [[sources]]
            entity = "Account"
            path = "account.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.identity_entity, "Owner");
        assert_eq!(config.identity_columns.email, "EmailAddress");
        assert_eq!(config.identity_columns.username, "Username");
        assert_eq!(config.sources[0].entity, "Account");
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "namespace = \"crm\"\nschema = \"schema.toml\"\n[[sources]]\nentity = \"Account\"\npath = \"data/account.csv\"\n",
        )
        .unwrap();

        let config = MigrateConfig::load(&path).unwrap();

        assert_eq!(config.schema, Some(dir.path().join("schema.toml")));
        assert_eq!(config.sources[0].path, dir.path().join("data/account.csv"));
    }

    #[test]
    fn test_parse_source_pair() {
        let source = SourceConfig::parse_pair("Contact=exports/contact.csv").unwrap();
        assert_eq!(source.entity, "Contact");
        assert_eq!(source.path, PathBuf::from("exports/contact.csv"));

        assert!(SourceConfig::parse_pair("Contact").is_err());
        assert!(SourceConfig::parse_pair("=file.csv").is_err());
    }

    #[test]
    fn test_validate_requires_namespace_and_sources() {
        let mut config = MigrateConfig::default();
        assert!(config.validate().is_err());

        config.namespace = "crm".to_string();
        assert!(config.validate().is_err());

        config.sources.push(SourceConfig {
            entity: "Account".to_string(),
            path: PathBuf::from("account.csv"),
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_entities() {
        let mut config = MigrateConfig {
            namespace: "crm".to_string(),
            ..Default::default()
        };
        config.sources.push(SourceConfig::parse_pair("Account=accounts-2014.csv").unwrap());
        config.sources.push(SourceConfig::parse_pair("Contact=contacts.csv").unwrap());
        config.sources.push(SourceConfig::parse_pair("Account=accounts-2015.csv").unwrap());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, MigrateError::Config(ref msg) if msg.contains("'Account'")));
    }
}
