//! Source extractors
//!
//! Each extractor turns one upload into a partial raw record:
//! - `spreadsheet` - `.xlsx` / `.xls` / `.csv`, two-pass column mapping
//! - `image` - AI extraction through an external collaborator, with retries
//!
//! `upload` holds the checks shared by both paths (size ceiling, type
//! detection); `retry` holds the backoff state machine used by `image`.

pub mod image;
pub mod retry;
pub mod spreadsheet;
pub mod upload;

use thiserror::Error;
use upload::format_size;

/// Extraction failure, rendered to the user through `Display`
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Upload exceeds the size ceiling (rejected before any I/O)
    #[error("File is too large ({}). Maximum allowed size is {}.", size_label(.size_bytes), size_label(.limit_bytes))]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// Empty upload
    #[error("No file provided")]
    MissingFile,

    /// Upload is not a supported spreadsheet or image type
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Workbook without any sheet
    #[error("The spreadsheet has no sheets")]
    NoSheets,

    /// No column or row label matched a report field
    #[error("Could not map any spreadsheet columns to report fields")]
    UnmappedColumns,

    /// File could not be decoded
    #[error("Could not read file: {0}")]
    Malformed(String),

    /// Network-level failure talking to the collaborator
    #[error("Extraction request failed: {0}")]
    Transport(String),

    /// Collaborator answered with a non-success status
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// Collaborator answered with something that is not the expected JSON
    #[error("Invalid extraction response: {0}")]
    InvalidResponse(String),

    /// Response parsed but contained no recognizable report field
    #[error("No report fields were found in the extraction result")]
    NoFieldsResolved,
}

fn size_label(bytes: &u64) -> String {
    format_size(*bytes)
}
