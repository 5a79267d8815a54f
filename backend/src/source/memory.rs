//! In-process backend, for embedding and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::SheetSource;
use crate::error::{SourceError, SourceResult};
use crate::models::RawTable;

#[derive(Default)]
pub struct MemorySource {
    workbook: String,
    sheets: RwLock<HashMap<String, RawTable>>,
    offline: AtomicBool,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new(workbook: impl Into<String>) -> Self {
        Self {
            workbook: workbook.into(),
            ..Self::default()
        }
    }

    /// Builder form of [`MemorySource::insert`].
    pub fn with_sheet(self, table: RawTable) -> Self {
        self.insert(table);
        self
    }

    /// Store `table` under its own name.
    pub fn insert(&self, table: RawTable) {
        if let Ok(mut sheets) = self.sheets.write() {
            sheets.insert(table.name.clone(), table);
        }
    }

    /// Simulate an unreachable backend.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of sheet reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn sheet(&self, name: &str) -> Option<RawTable> {
        self.sheets.read().ok()?.get(name).cloned()
    }

    fn check_online(&self) -> SourceResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SourceError::Http(format!("workbook '{}' is unreachable", self.workbook)));
        }
        Ok(())
    }
}

#[async_trait]
impl SheetSource for MemorySource {
    fn workbook(&self) -> &str {
        &self.workbook
    }

    async fn read_sheet(&self, sheet: &str) -> SourceResult<RawTable> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.sheet(sheet).ok_or_else(|| SourceError::SheetNotFound {
            workbook: self.workbook.clone(),
            sheet: sheet.to_string(),
        })
    }

    async fn write_sheet(&self, sheet: &str, table: &RawTable) -> SourceResult<()> {
        self.check_online()?;
        let mut table = table.clone();
        table.name = sheet.to_string();
        self.insert(table);
        Ok(())
    }
}
