//! `.xlsx`-backed row store
//!
//! The whole workbook is read into memory with calamine, edited there, and
//! written back with rust_xlsxwriter on [`WorkbookRowStore::save`]. Layout:
//! - one sheet per resource, row 1 is the header
//! - a `Parameters` sheet of `name | value` rows holding input parameters

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Format, Workbook};

use super::row::SheetData;
use super::store::{MemoryRowStore, RowStore};

/// Name of the sheet holding input parameters
pub const PARAMETERS_SHEET: &str = "Parameters";

/// Row store over an `.xlsx` file
#[derive(Debug)]
pub struct WorkbookRowStore {
    path: PathBuf,
    rows: MemoryRowStore,
    dirty: bool,
}

impl WorkbookRowStore {
    /// Open an existing workbook, or start an empty one if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rows = MemoryRowStore::new();

        if path.exists() {
            let mut workbook: Xlsx<_> = open_workbook(&path)
                .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

            let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
            for sheet_name in sheet_names {
                let range = workbook
                    .worksheet_range(&sheet_name)
                    .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;
                let grid = read_grid(&range);

                if sheet_name.eq_ignore_ascii_case(PARAMETERS_SHEET) {
                    for line in &grid {
                        let name = line.first().map(|s| s.trim()).unwrap_or("");
                        let value = line.get(1).map(|s| s.trim()).unwrap_or("");
                        // Tolerate a `name | value` header line
                        if name.is_empty() || name.eq_ignore_ascii_case("name") {
                            continue;
                        }
                        rows.set_parameter(name, value);
                    }
                    continue;
                }

                let mut lines = grid.into_iter();
                let header = lines.next().unwrap_or_default();
                rows.insert_sheet(sheet_name.clone(), SheetData::new(header, lines.collect()));
            }
            log::debug!(
                "Loaded {} sheet(s) and {} parameter(s) from {}",
                rows.sheet_names().len(),
                rows.parameters().len(),
                path.display()
            );
        } else {
            log::info!("{} does not exist yet, starting an empty workbook", path.display());
        }

        Ok(Self {
            path,
            rows,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether anything changed since opening or the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.rows.sheet_names()
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.rows.set_parameter(name, value);
        self.dirty = true;
    }

    /// Write the workbook back to its path
    pub fn save(&mut self) -> Result<()> {
        self.save_as(&self.path.clone())?;
        self.dirty = false;
        Ok(())
    }

    /// Write the workbook to another path
    pub fn save_as(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        for name in self.rows.sheet_names() {
            let Some(data) = self.rows.sheet(&name) else {
                continue;
            };
            let sheet = workbook.add_worksheet();
            sheet.set_name(&name)?;

            for (col, title) in data.header.iter().enumerate() {
                sheet.write_string_with_format(0, col as u16, title, &header_format)?;
            }
            for (row_idx, cells) in data.rows.iter().enumerate() {
                let row = (row_idx + 1) as u32;
                for (col, text) in cells.iter().enumerate() {
                    if !text.is_empty() {
                        sheet.write_string(row, col as u16, text)?;
                    }
                }
            }
            sheet.set_freeze_panes(1, 0)?;
        }

        let mut parameters: Vec<(&String, &String)> = self.rows.parameters().iter().collect();
        parameters.sort();
        if !parameters.is_empty() {
            let sheet = workbook.add_worksheet();
            sheet.set_name(PARAMETERS_SHEET)?;
            sheet.write_string_with_format(0, 0, "name", &header_format)?;
            sheet.write_string_with_format(0, 1, "value", &header_format)?;
            for (idx, (name, value)) in parameters.iter().enumerate() {
                let row = (idx + 1) as u32;
                sheet.write_string(row, 0, name.as_str())?;
                sheet.write_string(row, 1, value.as_str())?;
            }
            sheet.autofit();
        }

        workbook
            .save(path)
            .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
        log::info!("Workbook saved to {}", path.display());
        Ok(())
    }
}

impl RowStore for WorkbookRowStore {
    fn read_rows(&self, sheet: &str) -> Result<SheetData> {
        self.rows.read_rows(sheet)
    }

    fn write_row(&mut self, sheet: &str, row: usize, column: usize, values: &[String]) -> Result<()> {
        self.rows.write_row(sheet, row, column, values)?;
        self.dirty = true;
        Ok(())
    }

    fn append_rows(&mut self, sheet: &str, rows: &[Vec<String>]) -> Result<()> {
        self.rows.append_rows(sheet, rows)?;
        self.dirty = true;
        Ok(())
    }

    fn delete_rows(&mut self, sheet: &str, rows: &[usize]) -> Result<()> {
        self.rows.delete_rows(sheet, rows)?;
        self.dirty = true;
        Ok(())
    }

    fn clear(&mut self, sheet: &str) -> Result<()> {
        self.rows.clear(sheet)?;
        self.dirty = true;
        Ok(())
    }

    fn input_parameters(&self, sheet: &str) -> Result<HashMap<String, String>> {
        self.rows.input_parameters(sheet)
    }

    fn ensure_sheet(&mut self, sheet: &str, header: &[String]) -> Result<bool> {
        let created = self.rows.ensure_sheet(sheet, header)?;
        if created {
            self.dirty = true;
        }
        Ok(created)
    }
}

/// Cell text as the sync engine sees it
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Grid of cell texts anchored at A1, trailing empty cells trimmed
fn read_grid(range: &calamine::Range<Data>) -> Vec<Vec<String>> {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row.iter().map(cell_text));
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        grid.push(cells);
    }
    grid
}
