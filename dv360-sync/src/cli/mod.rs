//! Shared plumbing for the subcommands

pub mod commands;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use colored::*;

use dv360_sync::api::{EnvToken, ReqwestTransport};
use dv360_sync::config::SyncConfig;
use dv360_sync::sync::{RowStatus, SyncOrchestrator, SyncReport};

/// Load the config at `path`, or at the default location
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => SyncConfig::default_path()?,
    };
    SyncConfig::load(&path)
}

/// Orchestrator over a reqwest transport authenticated from the environment
pub fn build_orchestrator(config: SyncConfig) -> Result<SyncOrchestrator> {
    let tokens = Arc::new(EnvToken::new(config.api.token_env.clone()));
    let transport = ReqwestTransport::new(
        config.api.root_url(),
        tokens,
        config.resilience()?,
        config.api.timeout(),
    )?
    .with_page_limit(config.api.page_limit);

    log::debug!("Using API root {}", config.api.root_url());
    Ok(SyncOrchestrator::new(config, Arc::new(transport)))
}

/// The requested sheets, or every configured one when none were named
pub fn selected_sheets(config: &SyncConfig, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        if config.resources.is_empty() {
            bail!("No resources are configured");
        }
        return Ok(config.resources.iter().map(|r| r.sheet.clone()).collect());
    }
    for sheet in requested {
        config.resource_for_sheet(sheet)?;
    }
    Ok(requested.to_vec())
}

/// Human summary of one sync pass
pub fn print_report(report: &SyncReport) {
    println!(
        "{} {} ({})",
        "Sheet".bold(),
        report.sheet.cyan().bold(),
        report.kind.label().dimmed()
    );

    for outcome in &report.outcomes {
        let row = format!("row {:>4}", outcome.sheet_row());
        let line = match &outcome.status {
            RowStatus::Created { .. } => outcome.status.to_string().green(),
            RowStatus::Updated { .. } => outcome.status.to_string().yellow(),
            RowStatus::Deleted { .. } => outcome.status.to_string().red(),
            RowStatus::Unchanged => outcome.status.to_string().dimmed(),
            RowStatus::Failed { .. } => outcome.status.to_string().red().bold(),
        };
        if outcome.targeting_changes > 0 {
            println!(
                "  {}  {} {}",
                row.dimmed(),
                line,
                format!("[{} targeting change(s)]", outcome.targeting_changes).blue()
            );
        } else {
            println!("  {}  {}", row.dimmed(), line);
        }
    }

    println!(
        "  {} created, {} updated, {} unchanged, {} deleted, {}",
        report.created().to_string().green(),
        report.updated().to_string().yellow(),
        report.unchanged(),
        report.deleted().to_string().red(),
        if report.has_failures() {
            format!("{} failed", report.failed()).red().bold()
        } else {
            "0 failed".normal()
        }
    );
}
