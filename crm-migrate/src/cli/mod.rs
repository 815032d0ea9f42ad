//! Command line interface

pub mod commands;

use clap::{Parser, Subcommand};

use commands::graph::GraphCommands;
use commands::run::RunCommands;

#[derive(Parser)]
#[command(name = "crm-migrate")]
#[command(about = "Migrate CSV exports into a CRM record store in dependency order")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a migration
    Run(RunCommands),
    /// Show the migration graph without writing anything
    Graph(GraphCommands),
}
