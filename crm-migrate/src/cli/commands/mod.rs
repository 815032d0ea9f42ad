//! Subcommands and the arguments they share

pub mod graph;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crm_migrate::{Migrateable, MigrateConfig, SchemaCatalog, SourceConfig};

/// Output format for reports
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable summary
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Where the migration reads its configuration, schema and sources from
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Config file (defaults to ~/.config/crm-migrate/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Namespace the modules live in
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Schema catalog (TOML)
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Entity migrated in the identity pre-pass
    #[arg(long)]
    pub identity_entity: Option<String>,

    /// Source file as ENTITY=PATH, may be repeated
    #[arg(long = "source", value_name = "ENTITY=PATH")]
    pub sources: Vec<String>,
}

/// Everything needed to start a run
pub struct Prepared {
    pub config: MigrateConfig,
    pub schemas: SchemaCatalog,
    pub inputs: Vec<Migrateable>,
}

impl SourceArgs {
    /// Load the config file and layer the command line on top
    pub fn resolve(&self) -> Result<MigrateConfig> {
        let mut config = match &self.config {
            Some(path) => MigrateConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => MigrateConfig::load_or_default().context("Failed to load default config")?,
        };

        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(schema) = &self.schema {
            config.schema = Some(schema.clone());
        }
        if let Some(entity) = &self.identity_entity {
            config.identity_entity = entity.clone();
        }
        if !self.sources.is_empty() {
            config.sources = self
                .sources
                .iter()
                .map(|pair| SourceConfig::parse_pair(pair))
                .collect::<Result<Vec<_>, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn prepare(&self) -> Result<Prepared> {
        let config = self.resolve()?;

        let Some(schema_path) = &config.schema else {
            anyhow::bail!("No schema catalog given, use --schema or set 'schema' in the config");
        };
        let schemas = SchemaCatalog::load(schema_path)
            .with_context(|| format!("Failed to load schema catalog: {}", schema_path.display()))?;

        for source in &config.sources {
            if !source.path.exists() {
                anyhow::bail!("Source file does not exist: {}", source.path.display());
            }
        }

        let inputs = config
            .sources
            .iter()
            .map(|s| Migrateable::file(s.entity.clone(), s.path.clone()))
            .collect();

        Ok(Prepared {
            config,
            schemas,
            inputs,
        })
    }
}
