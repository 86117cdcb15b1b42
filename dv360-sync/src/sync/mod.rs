//! Sheet synchronization
//!
//! Rows come from a [`RowStore`]; [`SyncOrchestrator`] classifies them and
//! drives the API clients, writing results back into the same rows.

pub mod classify;
pub mod orchestrator;
pub mod report;
pub mod row;
pub mod store;
pub mod workbook;

pub use classify::{ClassifyError, RowAction, RowState, classify};
pub use orchestrator::SyncOrchestrator;
pub use report::{RowOutcome, RowStatus, SyncReport};
pub use row::SheetData;
pub use store::{MemoryRowStore, RowStore};
pub use workbook::WorkbookRowStore;
