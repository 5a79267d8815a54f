//! Directory-of-CSV backend: sheet `Salaires` lives in `<dir>/Salaires.csv`.
//!
//! Reads auto-detect encoding and delimiter. Writes are UTF-8, `;`-separated
//! (the separator French spreadsheet exports use), written to a temporary
//! file and renamed over the old one.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::SheetSource;
use crate::error::{SourceError, SourceResult};
use crate::models::RawTable;
use crate::parser::parse_csv_bytes_auto;

const WRITE_DELIMITER: u8 = b';';

pub struct CsvDirSource {
    dir: PathBuf,
    workbook: String,
}

impl CsvDirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let workbook = dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("workbook")
            .to_string();
        Self { dir, workbook }
    }

    /// `<dir>/<sheet>.csv`. The name must be a single plain file name so
    /// that no sheet resolves outside the directory.
    fn sheet_path(&self, sheet: &str) -> SourceResult<PathBuf> {
        let name = sheet.trim();
        let mut components = Path::new(name).components();
        let plain = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none()
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(SourceError::InvalidSheetName(sheet.to_string()));
        }
        Ok(self.dir.join(format!("{}.csv", name)))
    }
}

#[async_trait]
impl SheetSource for CsvDirSource {
    fn workbook(&self) -> &str {
        &self.workbook
    }

    async fn read_sheet(&self, sheet: &str) -> SourceResult<RawTable> {
        // A missing directory means the source is unreachable, not the sheet.
        tokio::fs::metadata(&self.dir).await?;

        let path = self.sheet_path(sheet)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::SheetNotFound {
                    workbook: self.workbook.clone(),
                    sheet: sheet.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.is_empty() {
            return Ok(RawTable::empty(sheet));
        }
        Ok(parse_csv_bytes_auto(&bytes, sheet)?.table)
    }

    async fn write_sheet(&self, sheet: &str, table: &RawTable) -> SourceResult<()> {
        let path = self.sheet_path(sheet)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = to_csv(table)?;
        let tmp = path.with_extension("csv.saving");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn to_csv(table: &RawTable) -> SourceResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(WRITE_DELIMITER)
        .flexible(true)
        .from_writer(Vec::new());

    writer
        .write_record(&table.headers)
        .map_err(|e| SourceError::Workbook(e.to_string()))?;
    for row in &table.rows {
        let fields: Vec<String> = row.iter().map(|c| c.as_text().unwrap_or_default()).collect();
        writer
            .write_record(&fields)
            .map_err(|e| SourceError::Workbook(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| SourceError::Workbook(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_roundtrip_keeps_amount_text() {
        let dir = tempdir().unwrap();
        let source = CsvDirSource::new(dir.path());

        let table = RawTable::new(
            "Formation",
            vec!["Nom".into(), "Coût Formation (€)".into(), "Date".into()],
            vec![vec![
                Cell::text("C"),
                Cell::text("1 200,50€"),
                Cell::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            ]],
        );
        source.write_sheet("Formation", &table).await.unwrap();

        let back = source.read_sheet("Formation").await.unwrap();
        assert_eq!(back.name, "Formation");
        assert_eq!(back.cell(0, "Coût Formation (€)"), &Cell::text("1 200,50€"));
        assert_eq!(back.cell(0, "Date"), &Cell::text("01/02/2024"));
    }

    #[tokio::test]
    async fn test_sheet_names_stay_inside_the_directory() {
        let root = tempdir().unwrap();
        let source = CsvDirSource::new(root.path().join("data"));
        let table = RawTable::new("x", vec!["Nom".into()], vec![vec![Cell::text("A")]]);

        for name in ["../escaped", "..", "sub/Salaires", "..\\escaped", "/tmp/abs", ""] {
            let err = source.write_sheet(name, &table).await.unwrap_err();
            assert!(matches!(err, SourceError::InvalidSheetName(_)), "{}", name);
        }
        assert!(!root.path().join("escaped.csv").exists());

        source.write_sheet("Salaires", &table).await.unwrap();
        let err = source.read_sheet("../data/Salaires").await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidSheetName(_)));
    }

    #[tokio::test]
    async fn test_missing_sheet_vs_missing_dir() {
        let dir = tempdir().unwrap();
        let source = CsvDirSource::new(dir.path());
        assert!(source.read_sheet("Salaires").await.unwrap_err().is_sheet_not_found());

        let gone = CsvDirSource::new(dir.path().join("nope"));
        assert!(matches!(gone.read_sheet("Salaires").await, Err(SourceError::Io(_))));
    }
}
