//! # Pilotage - HR/Sales workbook ingestion and normalization
//!
//! Pilotage reads the sheets of an HR workbook (people, salaries, training,
//! recruitment, finances, CRM pipeline), normalizes their messy hand-typed
//! content and joins them into one dataset the dashboard renders.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│  Normalize  │────▶│  Transform  │────▶│   Dataset   │
//! │ (xlsx/CSV/  │     │ (headers,   │     │ (joins,     │     │   + KPIs    │
//! │  HTTP)      │     │  numbers)   │     │  derived)   │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                                                           │
//!        └──────────────── writeback (whole-sheet replace) ◀─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pilotage::{load_dataset, PipelineOptions, XlsxSource};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = XlsxSource::new("Test_Dashboard.xlsx");
//!     let dataset = load_dataset(&source, &PipelineOptions::default()).await.unwrap();
//!     println!("Loaded {} employees", dataset.employees.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Raw sheets and typed records
//! - [`normalize`] - Number, date and header normalization
//! - [`parser`] - CSV and workbook decoding of uploads
//! - [`source`] - Spreadsheet backends
//! - [`transform`] - Joins, derived columns and the load pipeline
//! - [`writeback`] - Save path
//! - [`cache`] - Load cache
//! - [`session`] - Per-user session context
//! - [`kpi`] - Dashboard figures
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod models;

// Normalization and parsing
pub mod normalize;
pub mod parser;

// Backends
pub mod source;
pub mod writeback;

// Transformation
pub mod transform;

// State
pub mod cache;
pub mod session;

// Figures
pub mod kpi;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ParseError, PipelineError, ServerError, SourceError,
    PipelineResult, SourceResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Cell, Compensation, Employee, FinanceEntry, OpportunityRecord, Person, RawTable,
    RecruitmentCase, TrainingDetail, TrainingRecord,
};

// =============================================================================
// Re-exports - Normalization
// =============================================================================

pub use normalize::{canonical_header, normalize_headers, parse_amount, to_number};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{parse_csv_file_auto, parse_upload, ParsedCsv};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::{CsvDirSource, HttpSheetSource, MemorySource, SheetSource, SourceConfig, XlsxSource};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{build_dataset, load_dataset, Dataset, PipelineOptions, RawSheets, WorkbookLayout};
pub use writeback::{prepare_for_save, save_table};

// =============================================================================
// Re-exports - State and figures
// =============================================================================

pub use cache::LoadCache;
pub use config::AppConfig;
pub use kpi::{dashboard, DashboardKpis, DepartmentFilter};
pub use session::{Credentials, Session, SessionStore};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
