//! Graph command handler: build the migration graph and show it

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use crm_migrate::Migrator;

use super::super::OutputFormat;
use super::GraphCommands;

#[derive(Serialize)]
struct GraphNode {
    name: String,
    has_source: bool,
    depends_on: Vec<String>,
    spliced: Vec<String>,
}

#[derive(Serialize)]
struct GraphView {
    nodes: Vec<GraphNode>,
    entry_points: Vec<String>,
}

pub fn handle_graph_command(args: GraphCommands) -> Result<()> {
    let prepared = args.sources.prepare()?;
    let config = &prepared.config;

    let mut migrator = Migrator::new();
    migrator
        .build(
            &prepared.inputs,
            &prepared.schemas,
            &config.namespace,
            &config.identity_entity,
        )
        .context("Failed to build migration graph")?;
    migrator.make_acyclic();
    migrator.collect_leafs();

    let view = GraphView {
        nodes: migrator
            .nodes()
            .map(|n| GraphNode {
                name: n.name.clone(),
                has_source: n.source.is_some(),
                depends_on: n.children().to_vec(),
                spliced: n.spliced().to_vec(),
            })
            .collect(),
        entry_points: migrator.leafs().to_vec(),
    };

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&view).context("Failed to format JSON output")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_graph(&view),
    }

    Ok(())
}

fn print_graph(view: &GraphView) {
    println!("{} ({} nodes)", "Migration graph".bold(), view.nodes.len());
    println!();

    for node in &view.nodes {
        let name = if node.has_source {
            node.name.bright_green()
        } else {
            node.name.dimmed()
        };
        println!("  {}", name);
        for dependency in &node.depends_on {
            println!("    -> {}", dependency);
        }
        for dependency in &node.spliced {
            println!("    -/-> {} {}", dependency, "(cycle)".yellow());
        }
    }

    println!();
    println!("{} {}", "Entry points:".bold(), view.entry_points.join(", "));
}
