use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use std::path::PathBuf;

mod fix;
mod project;
mod reconcile;
mod restore;
mod schema;
mod tsc;

#[derive(Parser)]
#[command(name = "relfix")]
#[command(about = "Canonicalize Prisma relation names in TypeScript sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// Path to a relfix.toml (defaults to <ROOT>/relfix.toml when present)
    #[arg(long = "config", global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models, relation fields and their lookup variants
    #[command(alias = "s")]
    Schema(schema::SchemaArgs),

    /// Build the correction report, optionally confirmed by compiler diagnostics
    #[command(alias = "r")]
    Reconcile(reconcile::ReconcileArgs),

    /// Rewrite relation names in source files (dry run unless --apply)
    #[command(alias = "f")]
    Fix(fix::FixArgs),

    /// Put backed-up originals back in place
    Restore(restore::RestoreArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug; RUST_LOG overrides
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Schema(args) => schema::execute(args, config),
        Commands::Reconcile(args) => reconcile::execute(args, config),
        Commands::Fix(args) => fix::execute(args, config),
        Commands::Restore(args) => restore::execute(args, config),
    }
}
