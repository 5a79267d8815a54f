//! Spreadsheet backends.
//!
//! A workbook is addressed by name and holds named sheets. The pipeline only
//! needs two things from it: read a whole sheet, and replace a whole sheet.
//!
//! | Backend            | Location                          |
//! |--------------------|-----------------------------------|
//! | [`XlsxSource`]     | `.xlsx` / `.xlsm` / `.ods` file   |
//! | [`CsvDirSource`]   | directory of `<sheet>.csv` files  |
//! | [`HttpSheetSource`]| `http(s)://` sheet service        |
//! | [`MemorySource`]   | in-process tables                 |

mod csv_dir;
mod http;
mod memory;
mod xlsx;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SourceResult;
use crate::models::RawTable;

pub use csv_dir::CsvDirSource;
pub use http::{HttpSheetSource, SheetPayload};
pub use memory::MemorySource;
pub use xlsx::XlsxSource;

/// Read/replace access to the sheets of one workbook.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Workbook name, used as the load cache key.
    fn workbook(&self) -> &str;

    /// Read every row of `sheet`. A missing sheet is
    /// [`SourceError::SheetNotFound`](crate::error::SourceError::SheetNotFound).
    async fn read_sheet(&self, sheet: &str) -> SourceResult<RawTable>;

    /// Replace the whole content of `sheet` with `table`. Last writer wins.
    async fn write_sheet(&self, sheet: &str, table: &RawTable) -> SourceResult<()>;
}

/// Where the workbook lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Xlsx { path: PathBuf },
    CsvDir { path: PathBuf },
    Http { base_url: String, workbook: String, token: Option<String> },
}

impl SourceConfig {
    /// Pick a backend from a location string: URLs go to the HTTP backend,
    /// workbook extensions to the xlsx backend, anything else is a CSV
    /// directory.
    pub fn from_location(location: &str, workbook: &str) -> Self {
        let lower = location.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return SourceConfig::Http {
                base_url: location.to_string(),
                workbook: workbook.to_string(),
                token: None,
            };
        }
        let path = PathBuf::from(location);
        if has_workbook_extension(&path) {
            SourceConfig::Xlsx { path }
        } else {
            SourceConfig::CsvDir { path }
        }
    }

    pub fn with_token(self, token: Option<String>) -> Self {
        match self {
            SourceConfig::Http { base_url, workbook, .. } => SourceConfig::Http { base_url, workbook, token },
            other => other,
        }
    }
}

fn has_workbook_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "xlsx" | "xlsm" | "xlsb" | "xls" | "ods"))
        .unwrap_or(false)
}

/// Build the backend described by `config`.
pub fn open(config: &SourceConfig) -> Box<dyn SheetSource> {
    match config {
        SourceConfig::Xlsx { path } => Box::new(XlsxSource::new(path)),
        SourceConfig::CsvDir { path } => Box::new(CsvDirSource::new(path)),
        SourceConfig::Http { base_url, workbook, token } => {
            Box::new(HttpSheetSource::new(base_url, workbook).with_token(token.clone()))
        }
    }
}
