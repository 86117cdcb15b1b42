//! `sync`: push workbook rows to the API

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;
use colored::*;

use dv360_sync::sync::WorkbookRowStore;

use crate::cli::{build_orchestrator, load_config, print_report, selected_sheets};

#[derive(Args)]
pub struct SyncArgs {
    /// Workbook to sync (.xlsx)
    pub workbook: PathBuf,

    /// Sheet to sync; repeat for several, defaults to every configured sheet
    #[arg(short, long = "sheet")]
    pub sheets: Vec<String>,
}

pub async fn execute(args: SyncArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let sheets = selected_sheets(&config, &args.sheets)?;
    let orchestrator = build_orchestrator(config)?;

    if !args.workbook.exists() {
        bail!("Workbook does not exist: {}", args.workbook.display());
    }
    let mut store = WorkbookRowStore::open(&args.workbook)?;

    let mut failed_rows = 0;
    let mut failed_sheets = Vec::new();
    for sheet in &sheets {
        match orchestrator.sync_sheet(&mut store, sheet).await {
            Ok(report) => {
                print_report(&report);
                failed_rows += report.failed();
            }
            Err(e) => {
                log::error!("Sheet '{}' skipped: {:#}", sheet, e);
                println!("{} {}: {:#}", "Skipped".red().bold(), sheet.cyan(), e);
                failed_sheets.push(sheet.clone());
            }
        }
        println!();
    }

    // Rows already written back must reach the file even when others failed
    if store.is_dirty() {
        store.save()?;
        println!("{} {}", "Saved".green().bold(), args.workbook.display());
    }

    if !failed_sheets.is_empty() {
        bail!("{} sheet(s) could not be synced: {}", failed_sheets.len(), failed_sheets.join(", "));
    }
    if failed_rows > 0 {
        bail!("{} row(s) failed, see the _log column", failed_rows);
    }
    Ok(())
}
