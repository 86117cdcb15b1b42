//! Row stores
//!
//! The sync engine never touches a spreadsheet directly. It reads and writes
//! through [`RowStore`], addressed by sheet name and 0-based data row index.

use std::collections::HashMap;

use anyhow::{Context, Result, bail};

use super::row::SheetData;

/// Key-value access to sheet rows
pub trait RowStore {
    /// Header and data rows of a sheet
    fn read_rows(&self, sheet: &str) -> Result<SheetData>;

    /// Overwrite cells of one data row starting at `column`
    fn write_row(&mut self, sheet: &str, row: usize, column: usize, values: &[String]) -> Result<()>;

    /// Add data rows after the last one
    fn append_rows(&mut self, sheet: &str, rows: &[Vec<String>]) -> Result<()>;

    /// Remove data rows, one at a time in the given order
    ///
    /// Callers pass indices in descending order so earlier removals do not
    /// shift the rows still to be removed.
    fn delete_rows(&mut self, sheet: &str, rows: &[usize]) -> Result<()>;

    /// Remove every data row, keeping the header
    fn clear(&mut self, sheet: &str) -> Result<()>;

    /// Named input parameters visible to a sheet (parent ids and the like)
    fn input_parameters(&self, sheet: &str) -> Result<HashMap<String, String>>;

    /// Create the sheet with `header` if it does not exist; returns whether it was created
    fn ensure_sheet(&mut self, sheet: &str, header: &[String]) -> Result<bool>;
}

#[derive(Debug, Clone, Default)]
struct MemorySheet {
    name: String,
    data: SheetData,
}

/// In-memory row store
///
/// Sheets keep their insertion order. Parameters are global, optionally
/// overridden per sheet.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowStore {
    sheets: Vec<MemorySheet>,
    parameters: HashMap<String, String>,
    sheet_parameters: HashMap<String, HashMap<String, String>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sheet
    pub fn insert_sheet(&mut self, name: impl Into<String>, data: SheetData) {
        let name = name.into();
        match self.sheet_index(&name) {
            Some(index) => self.sheets[index].data = data,
            None => self.sheets.push(MemorySheet { name, data }),
        }
    }

    /// Builder-style sheet from string slices
    pub fn with_sheet(mut self, name: &str, header: &[&str], rows: &[&[&str]]) -> Self {
        let to_strings = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        self.insert_sheet(
            name,
            SheetData::new(to_strings(header), rows.iter().map(|r| to_strings(*r)).collect()),
        );
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Parameter visible only to `sheet`, taking precedence over a global one
    pub fn set_sheet_parameter(&mut self, sheet: &str, name: impl Into<String>, value: impl Into<String>) {
        self.sheet_parameters
            .entry(sheet.to_string())
            .or_default()
            .insert(name.into(), value.into());
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    /// Sheet data, if the sheet exists
    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheet_index(name).map(|index| &self.sheets[index].data)
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.name.eq_ignore_ascii_case(name.trim()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut SheetData> {
        let index = self
            .sheet_index(name)
            .with_context(|| format!("Sheet '{}' does not exist", name))?;
        Ok(&mut self.sheets[index].data)
    }
}

impl RowStore for MemoryRowStore {
    fn read_rows(&self, sheet: &str) -> Result<SheetData> {
        self.sheet(sheet)
            .cloned()
            .with_context(|| format!("Sheet '{}' does not exist", sheet))
    }

    fn write_row(&mut self, sheet: &str, row: usize, column: usize, values: &[String]) -> Result<()> {
        let data = self.sheet_mut(sheet)?;
        let Some(cells) = data.rows.get_mut(row) else {
            bail!("Sheet '{}' has no data row {}", sheet, row);
        };

        let end = column + values.len();
        if cells.len() < end {
            cells.resize(end, String::new());
        }
        cells[column..end].clone_from_slice(values);
        Ok(())
    }

    fn append_rows(&mut self, sheet: &str, rows: &[Vec<String>]) -> Result<()> {
        let data = self.sheet_mut(sheet)?;
        data.rows.extend(rows.iter().cloned());
        Ok(())
    }

    fn delete_rows(&mut self, sheet: &str, rows: &[usize]) -> Result<()> {
        let data = self.sheet_mut(sheet)?;
        for &row in rows {
            if row >= data.rows.len() {
                bail!("Sheet '{}' has no data row {}", sheet, row);
            }
            data.rows.remove(row);
        }
        Ok(())
    }

    fn clear(&mut self, sheet: &str) -> Result<()> {
        self.sheet_mut(sheet)?.rows.clear();
        Ok(())
    }

    fn input_parameters(&self, sheet: &str) -> Result<HashMap<String, String>> {
        let mut parameters = self.parameters.clone();
        if let Some((_, scoped)) = self
            .sheet_parameters
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(sheet.trim()))
        {
            parameters.extend(scoped.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(parameters)
    }

    fn ensure_sheet(&mut self, sheet: &str, header: &[String]) -> Result<bool> {
        if self.sheet_index(sheet).is_some() {
            return Ok(false);
        }
        self.insert_sheet(sheet, SheetData::new(header.to_vec(), Vec::new()));
        Ok(true)
    }
}
