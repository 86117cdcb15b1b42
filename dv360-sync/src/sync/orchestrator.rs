//! Sync passes over a sheet
//!
//! A pass reads every row once, classifies it, then runs creates, modifies
//! and deletes in that order, strictly one request at a time. Row failures
//! are written to the row's `_log` cell and never stop the pass; problems
//! with the sheet binding itself do, before any request is sent.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use super::classify::{RowAction, classify};
use super::report::{RowOutcome, RowStatus, SyncReport, status};
use super::row::{SheetData, sheet_row_number};
use super::store::RowStore;
use crate::api::path;
use crate::api::targeting::parse_options;
use crate::api::{HttpTransport, ResourceClient, TargetingReconciler, UpdateOutcome};
use crate::codec::{EntityCodec, reserved};
use crate::config::{ConfigError, SyncConfig};
use crate::model::{Resource, ResourceKind};

/// Runs sync and pull passes for the sheets named in a [`SyncConfig`]
pub struct SyncOrchestrator {
    config: SyncConfig,
    transport: Arc<dyn HttpTransport>,
}

/// A sheet resolved against the configuration
struct SheetBinding {
    kind: ResourceKind,
    codec: EntityCodec,
    client: ResourceClient,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn bind(&self, sheet: &str) -> Result<SheetBinding, ConfigError> {
        let resource = self.config.resource_for_sheet(sheet)?;
        let kind = resource.resource_kind()?;
        let codec = EntityCodec::new(kind, resource.translator_set()?);
        let client =
            ResourceClient::new(kind, self.transport.clone()).with_filter(resource.filter.clone());
        Ok(SheetBinding {
            kind,
            codec,
            client,
        })
    }

    /// Push the rows of `sheet` to the API
    pub async fn sync_sheet(&self, store: &mut dyn RowStore, sheet: &str) -> Result<SyncReport> {
        let binding = self.bind(sheet)?;
        let kind = binding.kind;
        if !kind.is_writable() {
            return Err(ConfigError::ReadOnlyKind {
                sheet: sheet.to_string(),
                kind,
            }
            .into());
        }

        let data = store
            .read_rows(sheet)
            .with_context(|| format!("Failed to read sheet '{}'", sheet))?;
        if data.column(kind.id_field()).is_none() {
            return Err(ConfigError::MissingColumn {
                sheet: sheet.to_string(),
                column: kind.id_field().to_string(),
            }
            .into());
        }
        let params = store.input_parameters(sheet)?;
        log::info!(
            "Syncing sheet '{}': {} data row(s) of {}",
            sheet,
            data.rows.len(),
            kind
        );

        let pass = SheetPass {
            sheet,
            binding: &binding,
            data: &data,
            params: &params,
            reconciler: TargetingReconciler::new(self.transport.clone()),
        };
        let mut report = SyncReport::new(sheet, kind);

        let mut creates = Vec::new();
        let mut modifies = Vec::new();
        let mut deletes = Vec::new();
        for row in 0..data.rows.len() {
            if data.is_blank(row) {
                continue;
            }
            let classified = classify(
                data.cell(row, reserved::RAW),
                data.cell(row, kind.id_field()),
                data.cell(row, reserved::ACTION),
            );
            match classified {
                Ok(RowAction::Create) => creates.push(row),
                Ok(RowAction::Modify) => modifies.push(row),
                Ok(RowAction::Delete) => deletes.push(row),
                Err(error) => {
                    let message = error.to_string();
                    pass.fail(store, row, None, &message)?;
                    report.push(row, None, RowStatus::Failed { message });
                }
            }
        }
        log::debug!(
            "Sheet '{}': {} to create, {} to modify, {} to delete",
            sheet,
            creates.len(),
            modifies.len(),
            deletes.len()
        );

        let queue = creates
            .into_iter()
            .map(|row| (row, RowAction::Create))
            .chain(modifies.into_iter().map(|row| (row, RowAction::Modify)))
            .chain(deletes.into_iter().map(|row| (row, RowAction::Delete)));

        for (row, action) in queue {
            match pass.process(store, row, action).await {
                Ok((status, targeting_changes)) => report.outcomes.push(RowOutcome {
                    row,
                    action: Some(action),
                    status,
                    targeting_changes,
                }),
                Err(error) => {
                    let message = format!("{:#}", error);
                    pass.fail(store, row, Some(action), &message)?;
                    report.push(row, Some(action), RowStatus::Failed { message });
                }
            }
        }

        let mut removed: Vec<usize> = report
            .outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, RowStatus::Deleted { .. }))
            .map(|outcome| outcome.row)
            .collect();
        if !removed.is_empty() {
            removed.sort_unstable_by(|a, b| b.cmp(a));
            store
                .delete_rows(sheet, &removed)
                .with_context(|| format!("Failed to remove deleted rows from '{}'", sheet))?;
        }

        log::info!(
            "Sheet '{}' done: {} created, {} updated, {} unchanged, {} deleted, {} failed",
            sheet,
            report.created(),
            report.updated(),
            report.unchanged(),
            report.deleted(),
            report.failed()
        );
        Ok(report)
    }

    /// Replace the rows of `sheet` with the current server state
    ///
    /// The sheet is created with the kind's default header when missing.
    /// Returns the number of rows written.
    pub async fn pull_sheet(&self, store: &mut dyn RowStore, sheet: &str) -> Result<usize> {
        let binding = self.bind(sheet)?;
        let kind = binding.kind;

        if store.ensure_sheet(sheet, &EntityCodec::default_header(kind))? {
            log::info!("Created sheet '{}' with the default {} header", sheet, kind);
        }
        let header = store.read_rows(sheet)?.header;
        let params = store.input_parameters(sheet)?;

        let entities = binding.client.list(&params).await?;

        let log_column = column_of(&header, reserved::LOG);
        let targeting_column = column_of(&header, reserved::TARGETING).filter(|_| kind.owns_targeting());
        let reconciler = TargetingReconciler::new(self.transport.clone());

        let mut rows = Vec::with_capacity(entities.len());
        for entity in &entities {
            let mut cells = binding.codec.entity_to_row(entity, &header);
            if let Some(column) = log_column {
                cells[column] = status::OK.to_string();
            }
            if let Some(column) = targeting_column {
                let mut owner = entity.clone();
                fill_parameters(&mut owner, &params);
                let options = reconciler.current(&owner).await?;
                cells[column] = Value::Array(options).to_string();
            }
            rows.push(cells);
        }

        store.clear(sheet)?;
        store.append_rows(sheet, &rows)?;
        log::info!("Pulled {} {} entities into '{}'", rows.len(), kind, sheet);
        Ok(rows.len())
    }
}

/// State shared by every row of one sync pass
struct SheetPass<'a> {
    sheet: &'a str,
    binding: &'a SheetBinding,
    data: &'a SheetData,
    params: &'a HashMap<String, String>,
    reconciler: TargetingReconciler,
}

impl SheetPass<'_> {
    /// Returns the row status and the number of targeting options changed
    async fn process(
        &self,
        store: &mut dyn RowStore,
        row: usize,
        action: RowAction,
    ) -> Result<(RowStatus, usize)> {
        match action {
            RowAction::Create => self.create(store, row).await,
            RowAction::Modify => self.modify(store, row).await,
            RowAction::Delete => Ok((self.delete(store, row).await?, 0)),
        }
    }

    async fn create(&self, store: &mut dyn RowStore, row: usize) -> Result<(RowStatus, usize)> {
        let desired = self.desired_targeting(row)?;
        let entity = self.entity_for(row);

        let created = self.binding.client.create(&entity).await?;
        let id = created.id().unwrap_or_default();
        self.write_back(store, row, &created, status::OK)?;

        let changes = match desired {
            Some(desired) => self.apply_targeting(store, row, &created, &entity, &desired).await?,
            None => 0,
        };
        Ok((RowStatus::Created { id }, changes))
    }

    async fn modify(&self, store: &mut dyn RowStore, row: usize) -> Result<(RowStatus, usize)> {
        let desired = self.desired_targeting(row)?;
        let entity = self.entity_for(row);

        let (current, outcome) = self.binding.client.update_with_outcome(&entity).await?;
        let log_text = match outcome {
            UpdateOutcome::Updated { .. } => status::OK,
            UpdateOutcome::Unchanged => status::NO_CHANGES,
        };
        self.write_back(store, row, &current, log_text)?;

        let changes = match desired {
            Some(desired) => self.apply_targeting(store, row, &current, &entity, &desired).await?,
            None => 0,
        };
        if changes > 0 && outcome == UpdateOutcome::Unchanged {
            self.write_log(store, row, status::OK)?;
        }

        let status = match outcome {
            UpdateOutcome::Updated { mask } => RowStatus::Updated { mask },
            UpdateOutcome::Unchanged => RowStatus::Unchanged,
        };
        Ok((status, changes))
    }

    async fn delete(&self, store: &mut dyn RowStore, row: usize) -> Result<RowStatus> {
        let entity = self.entity_for(row);

        // Only the fields addressing the entity, so the archive mask is just the status
        let kind = self.binding.kind;
        let mut target = Resource::new(kind);
        for name in path::placeholders(&kind.single_template()) {
            if let Some(value) = entity.get(&name) {
                target.set(&name, value.clone());
            }
        }

        self.binding.client.delete(&target).await?;
        self.write_log(store, row, status::DELETED)?;
        Ok(RowStatus::Deleted {
            id: target.id().unwrap_or_default(),
        })
    }

    /// Entity built from the row, completed with sheet parameters
    fn entity_for(&self, row: usize) -> Resource {
        let mut entity = self
            .binding
            .codec
            .row_to_entity(&self.data.header, &self.data.padded_row(row));
        fill_parameters(&mut entity, self.params);
        entity
    }

    /// Options of the `_targeting` cell; `None` when the row does not manage targeting
    fn desired_targeting(&self, row: usize) -> Result<Option<Vec<Value>>> {
        if !self.binding.kind.owns_targeting() || self.data.column(reserved::TARGETING).is_none() {
            return Ok(None);
        }
        parse_options(self.data.cell(row, reserved::TARGETING))
    }

    async fn apply_targeting(
        &self,
        store: &mut dyn RowStore,
        row: usize,
        owner: &Resource,
        entity: &Resource,
        desired: &[Value],
    ) -> Result<usize> {
        let Some(column) = self.data.column(reserved::TARGETING) else {
            return Ok(0);
        };

        let mut owner = owner.clone();
        fill_parameters(&mut owner, &entity.params());
        let reconciliation = self.reconciler.reconcile(&owner, desired).await.with_context(|| {
            format!(
                "Failed to apply targeting to {} {}",
                owner.kind(),
                owner.id().unwrap_or_default()
            )
        })?;

        let cell = Value::Array(reconciliation.options()).to_string();
        store.write_row(self.sheet, row, column, &[cell])?;
        Ok(reconciliation.created + reconciliation.deleted)
    }

    /// Rewrite the row from server state
    ///
    /// Columns that are not fields of the kind keep their contents, and
    /// `_targeting` is left to [`SheetPass::apply_targeting`].
    fn write_back(
        &self,
        store: &mut dyn RowStore,
        row: usize,
        resource: &Resource,
        log_text: &str,
    ) -> Result<()> {
        let kind = self.binding.kind;
        let rendered = self.binding.codec.entity_to_row(resource, &self.data.header);
        let mut cells = self.data.padded_row(row);

        for (column, name) in self.data.header.iter().enumerate() {
            let name = name.trim();
            cells[column] = match name {
                reserved::LOG => log_text.to_string(),
                reserved::ACTION => String::new(),
                reserved::RAW => rendered[column].clone(),
                reserved::TARGETING | "" => continue,
                field_path => {
                    let top = field_path.split('.').next().unwrap_or(field_path);
                    if !kind.declares(top) {
                        continue;
                    }
                    rendered[column].clone()
                }
            };
        }

        store
            .write_row(self.sheet, row, 0, &cells)
            .with_context(|| format!("Failed to write row {} of '{}'", sheet_row_number(row), self.sheet))
    }

    fn write_log(&self, store: &mut dyn RowStore, row: usize, text: &str) -> Result<()> {
        if let Some(column) = self.data.column(reserved::LOG) {
            store.write_row(self.sheet, row, column, &[text.to_string()])?;
        }
        Ok(())
    }

    fn fail(
        &self,
        store: &mut dyn RowStore,
        row: usize,
        action: Option<RowAction>,
        message: &str,
    ) -> Result<()> {
        match action {
            Some(action) => log::warn!(
                "{} of row {} in '{}' failed: {}",
                action,
                sheet_row_number(row),
                self.sheet,
                message
            ),
            None => log::warn!("Row {} in '{}': {}", sheet_row_number(row), self.sheet, message),
        }
        self.write_log(store, row, message)
    }
}

/// Fill parameters the row lacks: declared fields of the kind and the
/// parents its URIs are addressed by, never the identifier
fn fill_parameters(entity: &mut Resource, params: &HashMap<String, String>) {
    let kind = entity.kind();
    let addressing = path::placeholders(&kind.single_template());

    for (name, value) in params {
        if name == kind.id_field() || entity.get(name).is_some() {
            continue;
        }
        if kind.fields().contains(&name.as_str()) || addressing.contains(name) {
            entity.set(name, Value::String(value.clone()));
        }
    }
}

fn column_of(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|column| column.trim() == name)
}
