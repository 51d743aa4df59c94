//! Resolution of the project root, config and schema shared by all commands.

use anyhow::{Context, Result};
use clap::Args;
use log::debug;
use relfix_core::{CanonicalIndex, Config, Project, Schema};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Default, Clone)]
pub struct ProjectArgs {
    /// Project root. Defaults to the current directory.
    #[arg(value_name = "ROOT", value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Schema file, overriding the config (relative paths are resolved against ROOT)
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,
}

pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub project: Project,
}

impl Workspace {
    pub fn schema(&self) -> &Schema {
        &self.project.schema
    }

    pub fn index(&self) -> &CanonicalIndex {
        &self.project.index
    }

    /// `path` relative to the root for display, unchanged when outside it.
    pub fn display<'a>(&self, path: &'a Path) -> std::path::Display<'a> {
        path.strip_prefix(&self.root).unwrap_or(path).display()
    }
}

pub fn resolve_root(root: Option<&Path>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir()?,
    };
    root.canonicalize()
        .with_context(|| format!("Project root {} does not exist", root.display()))
}

pub fn load_config(root: &Path, config: Option<&Path>) -> Result<Config> {
    Ok(Config::discover(root, config)?)
}

/// Resolve root and config, then parse the schema. Any failure here is a
/// setup error: nothing has been touched yet.
pub fn load(args: &ProjectArgs, config: Option<&Path>) -> Result<Workspace> {
    let root = resolve_root(args.root.as_deref())?;
    let mut config = load_config(&root, config)?;
    if let Some(schema) = &args.schema {
        config.schema = schema.clone();
    }

    let schema_path = config.schema_path(&root);
    let project = Project::load(&schema_path)?;
    debug!(
        "Loaded {} models and {} canonical relation names from {}",
        project.schema.models.len(),
        project.index.canonical_names().len(),
        schema_path.display()
    );
    Ok(Workspace {
        root,
        config,
        project,
    })
}

pub fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
