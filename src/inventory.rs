//! The persisted inventory workbook
//!
//! The inventory is one `.xlsx` file whose first worksheet holds a header row
//! followed by records. [`InventoryStore`] owns the path and is the only code
//! that touches the file. Every write goes to a temporary file next to the
//! target and is renamed over it, so a reader sees either the old workbook or
//! the new one. Concurrent writers are not supported: the last one wins.

use crate::downloader::{to_xlsx, write_file_atomic};
use crate::error::{AppError, AppResult};
use crate::loader::from_excel;
use crate::regroup::SheetBlock;
use crate::table::{CellValue, Row};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const INVENTORY_SHEET_NAME: &str = "Inventory";

/// Inventory contents: column names and records
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Inventory {
    fn validate(&self) -> AppResult<()> {
        if self.headers.iter().any(|h| h.trim().is_empty()) {
            return Err(AppError::invalid_input("Column names must not be blank."));
        }
        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() > self.headers.len())
        {
            return Err(AppError::invalid_input(format!(
                "Record {} has {} values but there are only {} columns.",
                i + 1,
                row.len(),
                self.headers.len()
            )));
        }
        Ok(())
    }

    fn to_block(&self) -> SheetBlock {
        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        rows.push(self.headers.iter().map(|h| CellValue::text(h.as_str())).collect());
        rows.extend(self.rows.iter().cloned());
        SheetBlock {
            name: INVENTORY_SHEET_NAME.to_string(),
            rows,
        }
    }
}

/// Owner of the inventory file
#[derive(Clone, Debug)]
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InventoryStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the inventory. A missing file reads as an empty inventory.
    ///
    /// Columns with data but no header text are named after their column
    /// letter (`Column C`) so that what is read can always be saved back.
    pub fn read(&self) -> AppResult<Inventory> {
        if !self.path.exists() {
            return Ok(Inventory::default());
        }

        let bytes = fs::read(&self.path)?;
        let mut table = from_excel(bytes)?.into_iter();

        let mut headers: Vec<String> = match table.next() {
            Some(row) => row
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell.to_string().trim() {
                    "" => format!("Column {}", column_letters(i)),
                    _ => cell.to_string(),
                })
                .collect(),
            None => return Ok(Inventory::default()),
        };

        let rows: Vec<Row> = table
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .collect();

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for i in headers.len()..width {
            headers.push(format!("Column {}", column_letters(i)));
        }

        Ok(Inventory { headers, rows })
    }

    /// Raw workbook bytes, for download
    pub fn read_bytes(&self) -> AppResult<Vec<u8>> {
        if self.path.exists() {
            Ok(fs::read(&self.path)?)
        } else {
            to_xlsx(&[Inventory::default().to_block()])
        }
    }

    /// Replace every record with `inventory`
    pub fn replace(&self, inventory: &Inventory) -> AppResult<()> {
        inventory.validate()?;
        let bytes = to_xlsx(&[inventory.to_block()])?;
        write_file_atomic(&self.path, &bytes)?;
        log::info!(
            "inventory replaced: {} columns, {} records",
            inventory.headers.len(),
            inventory.rows.len()
        );
        Ok(())
    }

    /// Replace the inventory file wholesale with an uploaded workbook
    ///
    /// The upload must parse as a workbook; otherwise the current file is
    /// left untouched.
    pub fn replace_file(&self, bytes: Vec<u8>) -> AppResult<()> {
        from_excel(bytes.clone()).map_err(|e| {
            AppError::invalid_input(format!("The uploaded file is not a readable workbook: {}", e))
        })?;
        write_file_atomic(&self.path, &bytes)?;
        log::info!("inventory file replaced ({} bytes)", bytes.len());
        Ok(())
    }
}

/// Spreadsheet column letters for a zero-based index: 0 is `A`, 26 is `AA`
fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
