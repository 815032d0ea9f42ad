//! Run command handler

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::*;

use crm_migrate::store::{CsvRecordStore, MemoryIdentityStore, MemoryRecordStore};
use crm_migrate::{migrate, MigrationReport};

use super::super::OutputFormat;
use super::RunCommands;

const DEFAULT_OUTPUT_DIR: &str = "migrated";

pub fn handle_run_command(args: RunCommands) -> Result<()> {
    let prepared = args.sources.prepare()?;
    let config = prepared.config;

    let started = Instant::now();
    let mut identities = MemoryIdentityStore::new();

    let report = if args.dry_run {
        let mut records = MemoryRecordStore::new();
        migrate(
            &config,
            &prepared.inputs,
            &prepared.schemas,
            &mut identities,
            &mut records,
        )
        .context("Migration failed")?
    } else {
        let output = args
            .output
            .clone()
            .or_else(|| config.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut records = CsvRecordStore::new(&output)
            .with_context(|| format!("Failed to prepare output directory: {}", output.display()))?;

        let report = migrate(
            &config,
            &prepared.inputs,
            &prepared.schemas,
            &mut identities,
            &mut records,
        )
        .context("Migration failed")?;

        records.flush().context("Failed to flush migrated records")?;

        let identity_path = output.join(format!("{}.identities.csv", config.identity_entity));
        identities
            .write_csv(&identity_path)
            .context("Failed to export identities")?;

        println!("Output written to: {}", output.display().to_string().bright_green());
        report
    };

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to format JSON report")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_summary(&report, args.dry_run),
    }

    log::debug!("Run took {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn print_summary(report: &MigrationReport, dry_run: bool) {
    let title = if dry_run {
        "Dry run finished".yellow().bold()
    } else {
        "Migration finished".green().bold()
    };
    println!("{}", title);
    println!();
    println!("  Identities mapped: {}", report.identities.to_string().cyan());
    println!("  Nodes:             {}", report.nodes.to_string().cyan());
    println!("  Entry points:      {}", report.entry_points.to_string().cyan());
    println!("  Records written:   {}", report.total_records().to_string().cyan());

    if !report.spliced.is_empty() {
        println!();
        println!("{}", "Cycles broken:".yellow());
        for (node, dependency) in &report.spliced {
            println!("  {} -/-> {}", node, dependency.dimmed());
        }
    }

    println!();
    println!("{}", "Order:".bold());
    for (i, name) in report.order.iter().enumerate() {
        let count = report.records.get(name).copied().unwrap_or(0);
        println!("  {:>3}. {} ({} records)", i + 1, name, count);
    }

    if report.unresolved > 0 {
        println!();
        println!(
            "{} {} reference values were left empty",
            "Warning:".yellow().bold(),
            report.unresolved
        );
    }
}
