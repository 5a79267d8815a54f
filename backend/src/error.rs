//! Error types for the Pilotage pipeline.
//!
//! Only whole-load failures are errors here. Malformed cells never are: they
//! are defaulted by the normalizers.
//!
//! - [`SourceError`] - spreadsheet backend failures (unreachable, missing sheet)
//! - [`ParseError`] - CSV/workbook decoding of files and uploads
//! - [`ConfigError`] - environment and CLI configuration
//! - [`PipelineError`] - top-level load errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Conversion is automatic via `From`, so `?` works across boundaries.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors from a spreadsheet backend.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Local file or directory I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The workbook exists but has no sheet with this name.
    #[error("Sheet '{sheet}' not found in workbook '{workbook}'")]
    SheetNotFound { workbook: String, sheet: String },

    /// The sheet name cannot address a sheet (path separators, `..`).
    #[error("Invalid sheet name: '{0}'")]
    InvalidSheetName(String),

    /// The backend can be read but not saved to.
    #[error("Workbook '{0}' is read-only: only .xlsx files can be saved")]
    ReadOnly(String),

    /// The workbook file could not be opened, read or written.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Remote backend could not be reached.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Remote backend answered with something unusable.
    #[error("Invalid response from sheet service: {0}")]
    InvalidResponse(String),

    /// Sheet content could not be decoded.
    #[error("Sheet decoding failed: {0}")]
    Parse(#[from] ParseError),
}

impl SourceError {
    pub fn is_sheet_not_found(&self) -> bool {
        matches!(self, SourceError::SheetNotFound { .. })
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while decoding a CSV or workbook file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes could not be decoded to text.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Invalid CSV record.
    #[error("Line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Invalid workbook file.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// Empty file.
    #[error("File is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found")]
    NoHeaders,
}

// =============================================================================
// Configuration Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required setting absent.
    #[error("Missing configuration: {0}")]
    Missing(String),

    /// Setting present but unusable.
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Whole-load failures. One of these aborts the load and leaves the
/// previously displayed data in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source unreachable or misconfigured.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Upload error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not logged in")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type SourceResult<T> = Result<T, SourceError>;

pub type ParseResult<T> = Result<T, ParseError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;
