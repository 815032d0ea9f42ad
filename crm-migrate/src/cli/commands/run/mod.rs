mod handler;

use std::path::PathBuf;

use clap::Args;

use super::{OutputFormat, SourceArgs};

pub use handler::handle_run_command;

#[derive(Args, Debug)]
pub struct RunCommands {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Directory the migrated records are written to
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Migrate into memory only, nothing is written
    #[arg(long)]
    pub dry_run: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
