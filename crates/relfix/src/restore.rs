use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::project::{self, plural};

#[derive(Args, Debug, Default, Clone)]
#[command(about = "Put backed-up originals back in place")]
pub struct RestoreArgs {
    /// Project root. Defaults to the current directory.
    #[arg(value_name = "ROOT", value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,
}

pub fn execute(args: RestoreArgs, config: Option<&Path>) -> Result<()> {
    let root = project::resolve_root(args.root.as_deref())?;
    let config = project::load_config(&root, config)?;
    let summary = relfix_core::batch::restore(&config.batch_options(&root))?;
    for path in &summary.restored {
        println!(
            "{} {}",
            "✓".green(),
            path.strip_prefix(&root).unwrap_or(path).display()
        );
    }
    if summary.restored.is_empty() {
        println!("No backups found.");
    } else {
        println!("Restored {}", plural(summary.restored.len(), "file"));
    }

    if !summary.errors.is_empty() {
        for err in &summary.errors {
            eprintln!("  {err}");
        }
        bail!("{} could not be restored", plural(summary.errors.len(), "file"));
    }
    Ok(())
}
