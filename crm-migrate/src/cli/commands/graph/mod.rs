mod handler;

use clap::Args;

use super::{OutputFormat, SourceArgs};

pub use handler::handle_graph_command;

#[derive(Args, Debug)]
pub struct GraphCommands {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
