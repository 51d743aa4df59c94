use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use log::info;
use relfix_core::{CorrectionReport, CorrectionSet, DiagnosticReconciler, ReconcileStats};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::project::{self, ProjectArgs, Workspace, plural};
use crate::tsc;

const TOP_FILES: usize = 10;

#[derive(Args, Debug, Default, Clone)]
#[command(about = "Build the correction report from the schema and compiler diagnostics")]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Read compiler diagnostics from a file (one diagnostic per line)
    #[arg(long, value_name = "FILE", conflicts_with = "run")]
    pub diagnostics: Option<PathBuf>,

    /// Run the configured type-check command to gather diagnostics
    #[arg(long)]
    pub run: bool,

    /// Also keep schema-derived pairs that no diagnostic confirmed
    #[arg(long)]
    pub with_schema: bool,

    /// Where to write the report (defaults to the configured corrections file)
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: ReconcileArgs, config: Option<&Path>) -> Result<()> {
    let ws = project::load(&args.project, config)?;
    let diagnostics = gather_diagnostics(&args, &ws)?;

    let (corrections, stats, top_files) = match diagnostics {
        Some(text) => {
            let reconciler = DiagnosticReconciler::new(ws.index(), &ws.config.diagnostics.codes);
            let result = reconciler.reconcile(text.lines());
            let top_files = result.top_files(TOP_FILES);
            let corrections = if args.with_schema {
                let schema_pairs = ws.index().schema_corrections();
                CorrectionSet::new(
                    result.corrections.iter().chain(schema_pairs.iter()).cloned(),
                    ws.index(),
                )
            } else {
                result.corrections
            };
            (corrections, Some(result.stats), top_files)
        }
        None => (ws.index().schema_corrections(), None, Vec::new()),
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| ws.config.corrections_path(&ws.root));
    CorrectionReport::new(&corrections, ws.index(), stats.clone())
        .save(&output)
        .with_context(|| format!("Failed to save correction report to {}", output.display()))?;
    info!("Wrote {} corrections to {}", corrections.len(), output.display());

    if let Some(stats) = &stats {
        print_stats(stats);
    }
    print_corrections(&corrections);
    if !top_files.is_empty() {
        println!("\n{}", "Most affected files".bold());
        for (file, count) in &top_files {
            println!("  {count:>4}  {file}");
        }
    }
    println!(
        "\nWrote {} to {}",
        plural(corrections.len(), "correction"),
        ws.display(&output)
    );

    Ok(())
}

fn gather_diagnostics(args: &ReconcileArgs, ws: &Workspace) -> Result<Option<String>> {
    if let Some(path) = &args.diagnostics {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read diagnostics file {}", path.display()))?;
        return Ok(Some(text));
    }
    if !args.run {
        return Ok(None);
    }

    let settings = &ws.config.diagnostics;
    let output = tsc::run_diagnostics(
        &settings.command,
        &ws.root,
        Duration::from_secs(settings.timeout_secs),
    );
    if output.is_none() {
        eprintln!(
            "{} diagnostics unavailable, falling back to schema-only corrections",
            "Warning:".yellow()
        );
    }
    Ok(output)
}

fn print_stats(stats: &ReconcileStats) {
    println!("{}", "Diagnostics".bold());
    let codes = stats
        .by_code
        .iter()
        .map(|(code, n)| format!("{code}: {n}"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  examined:  {} ({codes})", stats.total);
    println!("  suggested: {}", stats.matched);
    println!("  confirmed: {}", stats.confirmed.to_string().green());
    println!("  discarded: {}", stats.discarded);
    println!();
}

fn print_corrections(corrections: &CorrectionSet) {
    if corrections.is_empty() {
        println!("No corrections found.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Incorrect", "Correct", "Confidence", "Occurrences"]);
    for pair in corrections.by_occurrences() {
        table.add_row(vec![
            Cell::new(&pair.incorrect).fg(Color::Red),
            Cell::new(&pair.correct).fg(Color::Green),
            Cell::new(format!("{:?}", pair.confidence).to_lowercase()),
            Cell::new(pair.occurrences.len()),
        ]);
    }
    println!("{}", "Recommended corrections".bold());
    println!("{table}");
}
