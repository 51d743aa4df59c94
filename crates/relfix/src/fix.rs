use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use log::{debug, info};
use relfix_core::{BatchSummary, Classifier, CorrectionSet, Mode, RewriteOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::project::{self, ProjectArgs, Workspace, plural};

const TOP_FILES: usize = 10;

#[derive(Args, Debug, Default, Clone)]
#[command(about = "Rewrite relation names in source files (dry run unless --apply)")]
pub struct FixArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Write changes to disk, keeping a backup of every rewritten file
    #[arg(long)]
    pub apply: bool,

    /// Additional directory names to skip
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Only rewrite occurrences whose context is certain
    #[arg(long)]
    pub strict: bool,

    /// Print a unified diff for each changed file
    #[arg(long)]
    pub diff: bool,

    /// Also process files matched by .gitignore
    #[arg(long)]
    pub no_gitignore: bool,

    /// Only list the first N changed files in a dry run
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Correction report to use instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub corrections: Option<PathBuf>,
}

pub fn execute(args: FixArgs, config: Option<&Path>) -> Result<()> {
    let ws = project::load(&args.project, config)?;
    let corrections = load_corrections(&args, &ws)?;
    if corrections.is_empty() {
        println!("No corrections to apply.");
        return Ok(());
    }

    let rules = ws.config.context_rules();
    let classifier = Classifier::new(&rules, &corrections, ws.index());

    let mut options = ws.config.batch_options(&ws.root);
    options.mode = if args.apply { Mode::Apply } else { Mode::DryRun };
    options.exclude.extend(args.exclude.iter().cloned());
    options.rewrite = RewriteOptions {
        strict: args.strict,
    };
    options.diff = args.diff;
    options.respect_gitignore = !args.no_gitignore;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let summary = relfix_core::batch::run(&classifier, &options, &cancel)?;

    print_files(&ws, &summary, &args);
    print_summary(&ws, &summary, &corrections, options.mode);
    print_review(&ws, &summary);
    print_errors(&ws, &summary);

    if summary.cancelled() {
        bail!(
            "Interrupted: {} not processed",
            plural(summary.files_skipped, "file")
        );
    }
    if options.mode == Mode::Apply && !summary.errors.is_empty() {
        bail!(
            "{} could not be rewritten",
            plural(summary.errors.len(), "file")
        );
    }
    Ok(())
}

/// Explicit report, then the configured report if present, then the schema.
fn load_corrections(args: &FixArgs, ws: &Workspace) -> Result<CorrectionSet> {
    if let Some(path) = &args.corrections {
        return ws
            .project
            .load_corrections(path)
            .with_context(|| format!("Failed to load corrections from {}", path.display()));
    }

    let default = ws.config.corrections_path(&ws.root);
    if default.is_file() {
        info!("Using corrections from {}", default.display());
        return ws
            .project
            .load_corrections(&default)
            .with_context(|| format!("Failed to load corrections from {}", default.display()));
    }

    debug!("No correction report, deriving corrections from the schema");
    Ok(ws.index().schema_corrections())
}

fn print_files(ws: &Workspace, summary: &BatchSummary, args: &FixArgs) {
    let changed: Vec<_> = summary.files.iter().filter(|f| f.changed).collect();
    let shown = match (args.apply, args.limit) {
        (false, Some(limit)) => limit.min(changed.len()),
        _ => changed.len(),
    };

    for outcome in &changed[..shown] {
        let report = &outcome.report;
        println!(
            "{} {}  ({} query, {} access)",
            if outcome.written { "✓".green() } else { "~".yellow() },
            ws.display(&outcome.path),
            report.query_block_fixes,
            report.access_fixes
        );
        if let Some(diff) = &outcome.diff {
            print!("{diff}");
        }
    }
    if shown < changed.len() {
        println!("  ... and {} more", plural(changed.len() - shown, "file"));
    }
}

fn print_summary(ws: &Workspace, summary: &BatchSummary, corrections: &CorrectionSet, mode: Mode) {
    println!();
    println!("{}", "Summary".bold());
    println!("  files scanned:     {}", summary.files_scanned);
    println!("  files changed:     {}", summary.files_changed);
    println!("  query-block fixes: {}", summary.query_block_fixes);
    println!("  access fixes:      {}", summary.access_fixes);
    println!("  lines changed:     {}", summary.changed_lines);
    if summary.files_skipped > 0 {
        println!("  files skipped:     {}", summary.files_skipped.to_string().red());
    }

    if !summary.totals.by_mapping.is_empty() {
        println!("\n{}", "Fixes by name".bold());
        let mut mappings: Vec<_> = summary.totals.by_mapping.iter().collect();
        mappings.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (incorrect, count) in mappings {
            let correct = corrections.get(incorrect).map_or("?", |p| p.correct.as_str());
            println!("  {count:>4}  {incorrect} -> {correct}");
        }
    }

    let top = summary.top_files(TOP_FILES);
    if !top.is_empty() {
        println!("\n{}", "Most affected files".bold());
        for outcome in top {
            println!(
                "  {:>4}  {}",
                outcome.report.total_fixes(),
                ws.display(&outcome.path)
            );
        }
    }

    if mode == Mode::DryRun && summary.files_changed > 0 {
        println!(
            "\n{} Nothing was written. Re-run with --apply to rewrite {}.",
            "Dry run:".yellow().bold(),
            plural(summary.files_changed, "file")
        );
    }
}

fn print_review(ws: &Workspace, summary: &BatchSummary) {
    let items: Vec<_> = summary
        .files
        .iter()
        .flat_map(|f| f.report.review.iter().map(move |item| (f, item)))
        .collect();
    if items.is_empty() {
        return;
    }

    println!("\n{}", "Needs review".yellow().bold());
    for (outcome, item) in items {
        let status = if item.applied { "rewritten" } else { "skipped" };
        println!(
            "  {}:{}:{}  {} -> {} ({status})",
            ws.display(&outcome.path),
            item.line,
            item.column,
            item.incorrect,
            item.correct
        );
        println!("      {}", item.context.trim().dimmed());
    }
}

fn print_errors(ws: &Workspace, summary: &BatchSummary) {
    if summary.errors.is_empty() {
        return;
    }
    eprintln!("\n{}", "Errors".red().bold());
    for err in &summary.errors {
        eprintln!("  {}: {}", ws.display(&err.path), err.message);
    }
}
