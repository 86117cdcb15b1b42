//! `kinds`: print the resource schema table

use anyhow::{Result, bail};
use clap::Args;
use colored::*;

use dv360_sync::codec::EntityCodec;
use dv360_sync::model::ResourceKind;

#[derive(Args)]
pub struct KindsArgs {
    /// Show the default sheet header of one kind
    pub kind: Option<String>,
}

pub fn execute(args: KindsArgs) -> Result<()> {
    if let Some(name) = args.kind {
        let Some(kind) = ResourceKind::parse(&name) else {
            bail!("Unknown resource kind '{}'", name);
        };
        print_kind(kind);
        return Ok(());
    }

    println!(
        "{:<27} {:<27} {:<9} {}",
        "KIND".bold(),
        "ID FIELD".bold(),
        "WRITABLE".bold(),
        "COLLECTION".bold()
    );
    for kind in ResourceKind::all() {
        println!(
            "{:<27} {:<27} {:<9} {}",
            kind.name().cyan(),
            kind.id_field(),
            if kind.is_writable() { "yes".green() } else { "no".red() },
            kind.collection_template().dimmed()
        );
    }
    Ok(())
}

fn print_kind(kind: ResourceKind) {
    println!("{} ({})", kind.label().bold(), kind.name().cyan());
    println!("  collection: {}", kind.collection_template());
    if let Some(query) = kind.list_query_template() {
        println!("  list query: {}", query);
    }
    println!("  identifier: {}", kind.id_field());
    println!("  writable:   {}", kind.is_writable());
    println!("  targeting:  {}", kind.owns_targeting());

    let translators = kind.default_translators();
    if !translators.is_empty() {
        println!("  translators:");
        for (field_path, translator) in translators {
            println!("    {} = {}", field_path, translator.name());
        }
    }

    println!("  default header:");
    println!("    {}", EntityCodec::default_header(kind).join(" | ").dimmed());
}
