use std::path::PathBuf;
use thiserror::Error;

use crate::order::LineStatus;

#[derive(Error, Debug)]
pub enum PacklineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Header inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Order store error: {0}")]
    Store(#[from] StoreError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("SKU mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Inbox error: {0}")]
    Inbox(#[from] InboxError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read spreadsheet '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read XLSX workbook: {0}")]
    Xlsx(String),

    #[error("Workbook has no worksheet")]
    MissingWorksheet,

    #[error("Failed to read delimited text: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InferenceError {
    /// No candidate header row satisfied any scoring rule.
    #[error("No recognizable headers in the first {rows_scanned} rows")]
    HeadersNotRecognized { rows_scanned: usize },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error("Order line not found: {0}")]
    NotFound(String),

    /// A conditional write found the line changed since the caller read it.
    #[error("Order line {line_id} changed since it was read")]
    Conflict { line_id: String },

    #[error("Invalid order line {line_id}: {reason}")]
    InvalidLine { line_id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Pick quantity {requested} outside 1..={available}")]
    InvalidQuantity { requested: u32, available: u32 },

    #[error("Order line {line_id} is already completed")]
    AlreadyCompleted { line_id: String },

    #[error("Order line {line_id} cannot be in status {status}")]
    InvalidState { line_id: String, status: LineStatus },

    /// The local view the pick was decided on is out of date.
    #[error("Order line {line_id} changed since it was viewed; refresh and retry")]
    StaleView { line_id: String },

    #[error("Actor name must not be empty")]
    MissingActor,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { line_id } => WorkflowError::StaleView { line_id },
            other => WorkflowError::Store(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum MappingError {
    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error("Mapping sheet has no master SKU column")]
    MissingMasterColumn,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScanError {
    #[error("No open line matches scanned code '{code}'")]
    NotFound { code: String },

    #[error("Scanned code is empty")]
    EmptyCode,
}

#[derive(Error, Debug)]
pub enum InboxError {
    #[error("Failed to read inbox directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, PacklineError>;
