//! Local workbook file backend.
//!
//! Reads go through calamine. A save rewrites the whole file with
//! rust_xlsxwriter: every other sheet is copied as read, the target sheet is
//! replaced (or appended), and the new file is moved over the old one.
//!
//! Only `.xlsx` files are saved. Other formats calamine reads (`.xls`,
//! `.xlsm`, `.xlsb`, `.ods`) are read-only, since rewriting them as xlsx
//! would leave a file that no longer matches its extension.

use async_trait::async_trait;
use calamine::{open_workbook_auto, Reader};
use rust_xlsxwriter::{Workbook, XlsxError};
use std::path::{Path, PathBuf};

use super::SheetSource;
use crate::error::{SourceError, SourceResult};
use crate::models::{Cell, RawTable};
use crate::normalize::format_date;
use crate::parser::range_to_table;

pub struct XlsxSource {
    path: PathBuf,
    workbook: String,
}

impl XlsxSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let workbook = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workbook")
            .to_string();
        Self { path, workbook }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether saves are allowed to this file.
    pub fn is_writable(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
    }
}

#[async_trait]
impl SheetSource for XlsxSource {
    fn workbook(&self) -> &str {
        &self.workbook
    }

    async fn read_sheet(&self, sheet: &str) -> SourceResult<RawTable> {
        let path = self.path.clone();
        let workbook = self.workbook.clone();
        let sheet = sheet.to_string();
        tokio::task::spawn_blocking(move || read_sheet_blocking(&path, &workbook, &sheet))
            .await
            .map_err(|e| SourceError::Workbook(e.to_string()))?
    }

    async fn write_sheet(&self, sheet: &str, table: &RawTable) -> SourceResult<()> {
        if !self.is_writable() {
            return Err(SourceError::ReadOnly(self.path.display().to_string()));
        }
        let path = self.path.clone();
        let sheet = sheet.to_string();
        let table = table.clone();
        tokio::task::spawn_blocking(move || write_sheet_blocking(&path, &sheet, table))
            .await
            .map_err(|e| SourceError::Workbook(e.to_string()))?
    }
}

fn read_all_blocking(path: &Path) -> SourceResult<Vec<RawTable>> {
    if !path.exists() {
        return Err(SourceError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("workbook not found: {}", path.display()),
        )));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| SourceError::Workbook(e.to_string()))?;
    let names = workbook.sheet_names().to_vec();
    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| SourceError::Workbook(e.to_string()))?;
        tables.push(range_to_table(&name, &range));
    }
    Ok(tables)
}

fn read_sheet_blocking(path: &Path, workbook: &str, sheet: &str) -> SourceResult<RawTable> {
    if !path.exists() {
        return Err(SourceError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("workbook not found: {}", path.display()),
        )));
    }
    let mut book = open_workbook_auto(path).map_err(|e| SourceError::Workbook(e.to_string()))?;
    // Tab names are matched after trimming, like headers.
    let name = book
        .sheet_names()
        .iter()
        .find(|n| n.trim() == sheet.trim())
        .cloned()
        .ok_or_else(|| SourceError::SheetNotFound {
            workbook: workbook.to_string(),
            sheet: sheet.to_string(),
        })?;
    let range = book
        .worksheet_range(&name)
        .map_err(|e| SourceError::Workbook(e.to_string()))?;
    let mut table = range_to_table(&name, &range);
    table.name = sheet.to_string();
    Ok(table)
}

fn write_sheet_blocking(path: &Path, sheet: &str, mut table: RawTable) -> SourceResult<()> {
    let mut tables = if path.exists() { read_all_blocking(path)? } else { Vec::new() };
    table.name = sheet.to_string();

    match tables.iter_mut().find(|t| t.name.trim() == sheet.trim()) {
        Some(existing) => *existing = table,
        None => tables.push(table),
    }

    let tmp = path.with_extension("saving.xlsx");
    write_workbook(&tmp, &tables).map_err(|e| SourceError::Workbook(e.to_string()))?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_workbook(path: &Path, tables: &[RawTable]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    for table in tables {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&table.name)?;
        for (col, header) in table.headers.iter().enumerate() {
            sheet.write_string(0, col as u16, header)?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            let r = r as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Number(n) => {
                        sheet.write_number(r, col, *n)?;
                    }
                    Cell::Text(s) => {
                        sheet.write_string(r, col, s)?;
                    }
                    Cell::Bool(b) => {
                        sheet.write_boolean(r, col, *b)?;
                    }
                    Cell::Date(d) => {
                        sheet.write_string(r, col, format_date(*d))?;
                    }
                }
            }
        }
    }
    workbook.save(path)
}
