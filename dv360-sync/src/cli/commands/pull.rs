//! `pull`: refresh workbook rows from the API

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;
use colored::*;

use dv360_sync::sync::WorkbookRowStore;

use crate::cli::{build_orchestrator, load_config, selected_sheets};

#[derive(Args)]
pub struct PullArgs {
    /// Workbook to write (.xlsx), created when missing
    pub workbook: PathBuf,

    /// Sheet to pull; repeat for several, defaults to every configured sheet
    #[arg(short, long = "sheet")]
    pub sheets: Vec<String>,
}

pub async fn execute(args: PullArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let sheets = selected_sheets(&config, &args.sheets)?;
    let orchestrator = build_orchestrator(config)?;
    let mut store = WorkbookRowStore::open(&args.workbook)?;

    let mut failed = Vec::new();
    for sheet in &sheets {
        match orchestrator.pull_sheet(&mut store, sheet).await {
            Ok(count) => println!("{} {} row(s) into {}", "Pulled".green().bold(), count, sheet.cyan()),
            Err(e) => {
                log::error!("Pull of '{}' failed: {:#}", sheet, e);
                println!("{} {}: {:#}", "Failed".red().bold(), sheet.cyan(), e);
                failed.push(sheet.clone());
            }
        }
    }

    if store.is_dirty() {
        store.save()?;
        println!("{} {}", "Saved".green().bold(), args.workbook.display());
    }

    if !failed.is_empty() {
        bail!("{} sheet(s) could not be pulled: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
