//! REST API types for the dashboard front end.
//!
//! All bodies are camelCase JSON. Errors share one shape, see
//! [`error_response`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::kpi::DashboardKpis;
use crate::models::RawTable;
use crate::transform::pipeline::Dataset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_id: Uuid,
}

/// Freshness of the data in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    /// Loaded (or cached) just now.
    Ready,
    /// The load failed; this is the session's last good dataset.
    Stale,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetResponse {
    pub status: DataStatus,
    /// Load error when `status` is `stale`.
    pub error: Option<String>,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KpiQuery {
    /// Department filter; absent keeps the session's current filter.
    pub service: Option<String>,
    /// Raise percentage for the simulation.
    pub raise: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiResponse {
    pub status: DataStatus,
    pub error: Option<String>,
    pub loaded_on: NaiveDate,
    pub kpis: DashboardKpis,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    /// Target sheet. When set, the uploaded table replaces it.
    pub sheet: Option<String>,

    /// Tab to read from an uploaded workbook. The first tab otherwise.
    pub tab: Option<String>,
}

/// Response after an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" (parsed only) or "saved"
    pub status: String,

    /// Table with normalized headers, as it would be saved
    pub table: RawTable,

    pub metadata: UploadMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub file_name: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub sheet: Option<String>,
}

impl UploadResponse {
    pub fn new(table: RawTable, file_name: &str, sheet: Option<String>) -> Self {
        let status = if sheet.is_some() { "saved" } else { "ready" };
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: UploadMetadata {
                file_name: file_name.to_string(),
                row_count: table.len(),
                columns: table.headers.clone(),
                sheet,
            },
            table,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub status: String,
    pub sheet: String,
    pub row_count: usize,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    #[test]
    fn test_upload_response_shape() {
        let table = RawTable::new("upload", vec!["Nom".into()], vec![vec![Cell::text("A")]]);
        let json = serde_json::to_value(UploadResponse::new(table, "rh.csv", Some("Salaires".into()))).unwrap();
        assert_eq!(json["status"], "saved");
        assert_eq!(json["metadata"]["rowCount"], 1);
        assert_eq!(json["metadata"]["fileName"], "rh.csv");
        assert_eq!(json["table"]["rows"][0][0], "A");
    }

    #[test]
    fn test_error_shape() {
        let json = error_response("Sheet 'Salaires' not found");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Sheet 'Salaires' not found");
    }
}
