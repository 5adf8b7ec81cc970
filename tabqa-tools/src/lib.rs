//! # tabqa File Tools
//!
//! The file-provider layer behind the agent's tool calls: loads tabular
//! files (CSV, XLSX) into an in-memory [`Table`], evaluates boolean
//! predicates over rows, and reads/searches structured JSON documents.
//!
//! Every operation returns a typed [`ToolError`] on failure; the agent's
//! tool executor turns these into model-readable error envelopes.

pub mod document;
pub mod query;
pub mod table;

pub use document::{read_document, search_document, DocumentInfo, KeyMatch};
pub use query::{compile, Predicate, QueryError};
pub use table::{Cell, Table};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for file-tool operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The file could not be read from disk.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but its contents could not be parsed.
    #[error("failed to parse '{path}': {message}")]
    Parse { path: String, message: String },

    /// The file extension is not one of the supported formats.
    #[error("unsupported file format: '{path}' (expected .csv, .xlsx, .xls or .json)")]
    UnsupportedFormat { path: String },

    /// The requested worksheet does not exist in the workbook.
    #[error("sheet '{sheet}' not found (available: {})", available.join(", "))]
    MissingSheet {
        sheet: String,
        available: Vec<String>,
    },

    /// The requested column does not exist in the table.
    #[error("column '{column}' not found")]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    /// The query expression failed to compile or referenced a bad column.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ToolError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn parse(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}
