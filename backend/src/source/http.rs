//! Remote sheet service backend.
//!
//! Contract:
//!
//! | Method | Path                                      | Body            |
//! |--------|-------------------------------------------|-----------------|
//! | GET    | `{base}/workbooks/{workbook}/sheets/{s}`  | -> SheetPayload |
//! | PUT    | `{base}/workbooks/{workbook}/sheets/{s}`  | SheetPayload -> |
//!
//! `404` on GET means the sheet does not exist. Any other failure makes
//! the whole source unreachable for this load. Network timeouts are the
//! HTTP client's defaults.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SheetSource;
use crate::error::{SourceError, SourceResult};
use crate::models::{Cell, RawTable};

/// Wire form of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetPayload {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl SheetPayload {
    pub fn from_table(table: &RawTable) -> Self {
        Self {
            headers: table.headers.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(Cell::to_json).collect())
                .collect(),
        }
    }

    pub fn into_table(self, name: &str) -> RawTable {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();
        RawTable::new(name, self.headers, rows)
    }
}

#[derive(Clone)]
pub struct HttpSheetSource {
    client: reqwest::Client,
    base_url: String,
    workbook: String,
    token: Option<String>,
}

impl HttpSheetSource {
    pub fn new(base_url: &str, workbook: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            workbook: workbook.to_string(),
            token: None,
        }
    }

    /// Bearer token sent with every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn sheet_url(&self, sheet: &str) -> SourceResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::Http(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Http(format!("base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["workbooks", self.workbook.as_str(), "sheets", sheet.trim()]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    fn workbook(&self) -> &str {
        &self.workbook
    }

    async fn read_sheet(&self, sheet: &str) -> SourceResult<RawTable> {
        let url = self.sheet_url(sheet)?;
        tracing::debug!(%url, "fetching sheet");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::SheetNotFound {
                workbook: self.workbook.clone(),
                sheet: sheet.to_string(),
            }),
            status if status.is_success() => {
                let payload: SheetPayload = response
                    .json()
                    .await
                    .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
                Ok(payload.into_table(sheet))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SourceError::Http(format!("GET {} returned {}: {}", sheet, status, body)))
            }
        }
    }

    async fn write_sheet(&self, sheet: &str, table: &RawTable) -> SourceResult<()> {
        let url = self.sheet_url(sheet)?;
        let payload = SheetPayload::from_table(table);

        let response = self
            .authorize(self.client.put(url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http(format!("PUT {} returned {}: {}", sheet, status, body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sheet_url_encodes_names() {
        let source = HttpSheetSource::new("https://sheets.example/api/", "Test Dashboard");
        let url = source.sheet_url("Données Sociales").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example/api/workbooks/Test%20Dashboard/sheets/Donn%C3%A9es%20Sociales"
        );
    }

    #[test]
    fn test_payload_to_table() {
        let payload: SheetPayload = serde_json::from_value(json!({
            "headers": ["Nom", "Salaire (€)"],
            "rows": [["A", "2 000,00 €"], ["B", 1800], [null, ""]]
        }))
        .unwrap();
        let table = payload.into_table("Salaires");
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "Salaire (€)"), &Cell::Number(1800.0));
    }

    #[test]
    fn test_payload_from_table_serializes_dates() {
        let table = RawTable::new(
            "Recrutement",
            vec!["Date Ouverture Poste".into()],
            vec![vec![Cell::Date(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())]],
        );
        let payload = SheetPayload::from_table(&table);
        assert_eq!(payload.rows[0][0], json!("01/06/2024"));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let source = HttpSheetSource::new("http://127.0.0.1:9", "RH");
        let err = source.read_sheet("Salaires").await.unwrap_err();
        assert!(matches!(err, SourceError::Http(_)));
    }
}
