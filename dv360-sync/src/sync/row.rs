//! Sheet contents as read from a row store

use crate::codec::reserved;

/// A sheet's header and data rows
///
/// Row indices used throughout the sync engine are 0-based positions in
/// `rows`, i.e. they exclude the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Position of a header column (exact match after trimming)
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column.trim() == name)
    }

    /// Cell text of a data row, empty when the row is short or the column missing
    pub fn cell(&self, row: usize, name: &str) -> &str {
        self.column(name)
            .and_then(|column| self.rows.get(row)?.get(column))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }

    /// Whether every cell of a data row is empty
    pub fn is_blank(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_none_or(|cells| cells.iter().all(|cell| cell.trim().is_empty()))
    }

    /// Data row padded to the header width
    pub fn padded_row(&self, row: usize) -> Vec<String> {
        let mut cells = self.rows.get(row).cloned().unwrap_or_default();
        if cells.len() < self.header.len() {
            cells.resize(self.header.len(), String::new());
        }
        cells
    }

    pub fn has_log_column(&self) -> bool {
        self.column(reserved::LOG).is_some()
    }
}

/// 1-based sheet row number of a data row, as a spreadsheet shows it
pub fn sheet_row_number(row: usize) -> usize {
    row + 2
}
