use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::path::Path;

use crate::project::{self, ProjectArgs};

#[derive(Args, Debug, Default, Clone)]
#[command(about = "List models, relation fields and their lookup variants")]
pub struct SchemaArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the parsed schema as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: SchemaArgs, config: Option<&Path>) -> Result<()> {
    let ws = project::load(&args.project, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(ws.schema())?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Model", "Relation", "Target", "Kind", "Variants"]);

    for model in &ws.schema().models {
        for field in model.relations() {
            let kind = match field.multiplicity {
                relfix_core::Multiplicity::Single if field.optional => "single, optional",
                relfix_core::Multiplicity::Single => "single",
                relfix_core::Multiplicity::Collection => "collection",
            };
            table.add_row(vec![
                Cell::new(&model.name).fg(Color::Cyan),
                Cell::new(&field.name),
                Cell::new(field.target_type.as_deref().unwrap_or_default()),
                Cell::new(kind),
                Cell::new(ws.index().variants_of(&field.name).join(", ")),
            ]);
        }
    }

    println!("{}", "Relations".bold());
    println!("{table}");
    println!(
        "{} models, {} canonical relation names",
        ws.schema().models.len(),
        ws.index().canonical_names().len()
    );

    let collisions = ws.index().collisions();
    if !collisions.is_empty() {
        println!("\n{}", "Ambiguous variants".yellow().bold());
        for c in collisions {
            println!("  {} -> {} (also {})", c.variant, c.kept.green(), c.rejected);
        }
    }

    Ok(())
}
