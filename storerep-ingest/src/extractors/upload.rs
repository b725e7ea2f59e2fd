//! Upload validation and file type detection
//!
//! Both upload kinds share one size ceiling, checked before the body is read
//! whenever the length is known up front.

use super::ExtractionError;
use std::path::Path;

/// Size ceiling for spreadsheet and image uploads (8 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 8 * 1024 * 1024;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";
const CSV_MIMES: &[&str] = &["text/csv", "application/csv", "text/comma-separated-values"];

/// Uploaded file held in memory
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: Option<String>,
    /// Declared MIME type (from the request), without parameters
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(bytes: Vec<u8>, filename: Option<String>, mime_type: Option<String>) -> Self {
        Self {
            filename: filename.filter(|f| !f.trim().is_empty()),
            mime_type: mime_type.map(|m| essence(&m)).filter(|m| !m.is_empty()),
            bytes,
        }
    }

    /// Reject empty or oversized uploads
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.bytes.is_empty() {
            return Err(ExtractionError::MissingFile);
        }
        check_size(self.bytes.len() as u64)
    }

    /// Lowercase file extension, if the filename has one
    pub fn extension(&self) -> Option<String> {
        self.filename
            .as_deref()
            .and_then(|f| Path::new(f).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Reject a declared or measured size above [`MAX_UPLOAD_BYTES`]
pub fn check_size(size_bytes: u64) -> Result<(), ExtractionError> {
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(ExtractionError::FileTooLarge {
            size_bytes,
            limit_bytes: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Format a byte count as megabytes with one decimal ("9.5 MB")
pub fn format_size(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// MIME essence: lowercase, parameters dropped ("text/csv; charset=utf-8" → "text/csv")
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Accepted spreadsheet formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Xls,
    Csv,
}

impl SpreadsheetFormat {
    /// Detect from extension, then declared MIME type, then file signature
    pub fn detect(upload: &Upload) -> Result<Self, ExtractionError> {
        if let Some(format) = upload.extension().as_deref().and_then(Self::from_extension) {
            return Ok(format);
        }
        if let Some(format) = upload.mime_type.as_deref().and_then(Self::from_mime) {
            return Ok(format);
        }
        if let Some(format) = infer::get(&upload.bytes).and_then(|kind| Self::from_mime(kind.mime_type())) {
            return Ok(format);
        }

        let described = upload
            .filename
            .clone()
            .or_else(|| upload.mime_type.clone())
            .unwrap_or_else(|| "unknown".to_string());
        Err(ExtractionError::UnsupportedType(format!(
            "{} (expected .xlsx, .xls or .csv)",
            described
        )))
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xlsx" => Some(SpreadsheetFormat::Xlsx),
            "xls" => Some(SpreadsheetFormat::Xls),
            "csv" => Some(SpreadsheetFormat::Csv),
            _ => None,
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            XLSX_MIME => Some(SpreadsheetFormat::Xlsx),
            XLS_MIME => Some(SpreadsheetFormat::Xls),
            m if CSV_MIMES.contains(&m) => Some(SpreadsheetFormat::Csv),
            _ => None,
        }
    }
}

/// MIME type of an image upload
///
/// A declared `image/*` type is trusted; otherwise the file signature decides.
pub fn detect_image_mime(upload: &Upload) -> Result<String, ExtractionError> {
    if let Some(mime) = upload.mime_type.as_deref() {
        if mime.starts_with("image/") {
            return Ok(mime.to_string());
        }
    }

    match infer::get(&upload.bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Ok(kind.mime_type().to_string())
        }
        Some(kind) => Err(ExtractionError::UnsupportedType(format!(
            "{} is not an image",
            kind.mime_type()
        ))),
        None => Err(ExtractionError::UnsupportedType(
            upload
                .mime_type
                .clone()
                .unwrap_or_else(|| "unrecognized file is not an image".to_string()),
        )),
    }
}
