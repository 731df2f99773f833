use std::path::PathBuf;

use thiserror::Error;

use crate::model::WellPosition;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ElisaError>;

/// Rejections raised by the plate model and the grid parsing boundary. These
/// are always surfaced before any backend is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Raised when input does not form an 8x12 grid of wells.
    #[error("malformed grid: {0}")]
    MalformedGrid(String),

    /// Raised when the plate name is empty after trimming.
    #[error("plate name must not be empty")]
    EmptyName,

    /// Raised when a well carries a sample name without a measurement value,
    /// or a value without a sample name.
    #[error("well {0} has a sample name without a value, or a value without a sample name")]
    MismatchedWell(WellPosition),

    /// Raised when a well is flagged as an assay control but carries no sample.
    #[error("control well {0} does not carry a sample")]
    InvalidControl(WellPosition),
}

/// Error type covering the different failure cases that can occur when the
/// tool records, mirrors, or fetches plates.
#[derive(Debug, Error)]
pub enum ElisaError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a candidate plate fails model validation.
    #[error("invalid plate: {0}")]
    Validation(#[from] ValidationError),

    /// Errors bubbled up from the SQLite driver.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Raised when stored rows cannot be reassembled into a plate.
    #[error("local store error: {0}")]
    LocalStore(String),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors bubbled up from the HTTP client while reaching the remote
    /// document service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when the remote document service refuses a request.
    #[error("remote store error: {0}")]
    Remote(String),

    /// Raised when a remote section cannot be parsed back into a plate.
    #[error("remote read error: {0}")]
    RemoteRead(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
