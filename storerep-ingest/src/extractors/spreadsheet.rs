//! Spreadsheet extractor
//!
//! Sheets arrive in two common shapes, so extraction runs two passes over the
//! first sheet:
//!
//! 1. **Row-as-record**: row 0 is a header row; the first data row that maps
//!    at least one non-empty cell to a report field is taken as the record.
//! 2. **Key/value**: every row with two or more columns is read as
//!    `label | value`. A resolved label only fills a field that pass 1 did
//!    not already find.

use super::upload::{SpreadsheetFormat, Upload};
use super::ExtractionError;
use crate::alias::AliasResolver;
use crate::normalizer::RawRecord;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::Value;
use std::io::Cursor;
use tracing::{debug, info};

/// Largest magnitude below which every whole f64 is an exact integer (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Empty cells and whitespace-only text carry no value
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell rendered as a label for alias resolution
    pub fn label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    /// Cell as an unsanitized raw value
    pub fn to_raw(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            // Whole numbers stay integers so text fields read "35", not "35.0"
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => Value::from(*n as i64),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::from(s.as_str()),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// One sheet: rows of cells, not necessarily rectangular
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Build a sheet of text cells (CSV-style)
    pub fn from_text_rows<R, C>(name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            name: name.to_string(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|c| Cell::from(c.as_ref())).collect())
                .collect(),
        }
    }
}

/// Ordered sheets of a workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Decode an upload according to its detected format
    pub fn load(upload: &Upload) -> Result<Self, ExtractionError> {
        match SpreadsheetFormat::detect(upload)? {
            SpreadsheetFormat::Csv => Self::from_csv(&upload.bytes),
            SpreadsheetFormat::Xlsx | SpreadsheetFormat::Xls => Self::from_excel(&upload.bytes),
        }
    }

    /// Parse CSV bytes into a single-sheet workbook
    ///
    /// No header handling here; rows may have differing lengths. Invalid
    /// UTF-8 is replaced rather than rejected.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record.map_err(|e| ExtractionError::Malformed(e.to_string()))?;
            rows.push(
                record
                    .iter()
                    .map(|field| Cell::from(&*String::from_utf8_lossy(field)))
                    .collect(),
            );
        }

        Ok(Self {
            sheets: vec![Sheet {
                name: "Sheet1".to_string(),
                rows,
            }],
        })
    }

    /// Parse `.xlsx` / `.xls` bytes
    pub fn from_excel(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| ExtractionError::Malformed(format!("sheet '{}': {}", name, e)))?;
            let rows = range
                .rows()
                .map(|row| row.iter().map(Cell::from).collect())
                .collect();
            sheets.push(Sheet { name, rows });
        }

        Ok(Self { sheets })
    }
}

/// Extract a raw record from the first sheet of a workbook
///
/// # Errors
/// * `NoSheets` - the workbook has no sheet
/// * `UnmappedColumns` - neither pass resolved a single field
pub fn extract_workbook(workbook: &Workbook, resolver: &AliasResolver) -> Result<RawRecord, ExtractionError> {
    let sheet = workbook.sheets.first().ok_or(ExtractionError::NoSheets)?;
    let record = extract_sheet(sheet, resolver);

    if record.is_empty() {
        return Err(ExtractionError::UnmappedColumns);
    }

    info!(
        sheet = %sheet.name,
        fields = record.len(),
        "Spreadsheet extraction complete"
    );
    Ok(record)
}

/// Decode an upload and extract its raw record
pub fn extract_upload(upload: &Upload, resolver: &AliasResolver) -> Result<RawRecord, ExtractionError> {
    upload.validate()?;
    let workbook = Workbook::load(upload)?;
    extract_workbook(&workbook, resolver)
}

/// Run both passes over one sheet; the result may be empty
pub fn extract_sheet(sheet: &Sheet, resolver: &AliasResolver) -> RawRecord {
    let mut record = row_as_record_pass(sheet, resolver);
    let from_rows = record.len();
    let added = key_value_pass(sheet, resolver, &mut record);

    debug!(
        sheet = %sheet.name,
        row_as_record = from_rows,
        key_value = added,
        "Spreadsheet passes finished"
    );
    record
}

/// Header row + data rows; first data row with any resolved value wins
fn row_as_record_pass(sheet: &Sheet, resolver: &AliasResolver) -> RawRecord {
    let Some((header, data_rows)) = sheet.rows.split_first() else {
        return RawRecord::new();
    };

    let columns: Vec<_> = header.iter().map(|cell| resolver.resolve(&cell.label())).collect();
    if columns.iter().all(Option::is_none) {
        return RawRecord::new();
    }

    for (index, row) in data_rows.iter().enumerate() {
        let mut candidate = RawRecord::new();
        for (cell, column) in row.iter().zip(&columns) {
            if let Some(field) = column {
                if !cell.is_empty() {
                    candidate.insert_if_absent(*field, cell.to_raw());
                }
            }
        }

        if !candidate.is_empty() {
            debug!(data_row = index + 1, fields = candidate.len(), "Row-as-record match");
            return candidate;
        }
    }

    RawRecord::new()
}

/// `label | value` rows; never overwrites a field already present
fn key_value_pass(sheet: &Sheet, resolver: &AliasResolver, record: &mut RawRecord) -> usize {
    let mut added = 0;
    for row in sheet.rows.iter().filter(|row| row.len() >= 2) {
        let Some(field) = resolver.resolve(&row[0].label()) else {
            continue;
        };
        if row[1].is_empty() {
            continue;
        }
        if record.insert_if_absent(field, row[1].to_raw()) {
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::resolver;
    use crate::schema::{Field, FieldValue};
    use serde_json::json;

    #[test]
    fn test_row_as_record() {
        let sheet = Sheet::from_text_rows(
            "Sheet1",
            vec![vec!["Store Name", "Total Revenue"], vec!["Acme", "$10,000"]],
        );
        let record = extract_sheet(&sheet, resolver());

        assert_eq!(record.len(), 2);
        assert_eq!(record.get(Field::StoreName), Some(&json!("Acme")));
        assert_eq!(record.get(Field::TotalRevenue), Some(&json!("$10,000")));
    }

    #[test]
    fn test_first_data_row_with_a_value_wins() {
        let sheet = Sheet::from_text_rows(
            "Sheet1",
            vec![
                vec!["Notes", "Store", "Revenue"],
                vec!["blank row", "", ""],
                vec!["", "First", "100"],
                vec!["", "Second", "200"],
            ],
        );
        let record = extract_sheet(&sheet, resolver());
        assert_eq!(record.get(Field::StoreName), Some(&json!("First")));
        assert_eq!(record.get(Field::TotalRevenue), Some(&json!("100")));
    }

    #[test]
    fn test_key_value_layout() {
        let sheet = Sheet::from_text_rows(
            "Metrics",
            vec![
                vec!["Metric", "Value"],
                vec!["Store Name", "Acme"],
                vec!["Funnel Coverage", "72%"],
                vec!["Post-Purchase Revenue", "(1,250)"],
                vec!["Unrelated", "x"],
            ],
        );
        let record = extract_sheet(&sheet, resolver());

        assert_eq!(record.get(Field::StoreName), Some(&json!("Acme")));
        assert_eq!(record.get(Field::FunnelCoverage), Some(&json!("72%")));
        assert_eq!(record.get(Field::PostPurchaseRevenue), Some(&json!("(1,250)")));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_key_value_never_overwrites_row_as_record() {
        let sheet = Sheet::from_text_rows(
            "Sheet1",
            vec![
                vec!["Total Revenue", "Store Name"],
                vec!["5000", "Acme"],
                vec!["Total Revenue", "9999"],
                vec!["Cart Revenue", "300"],
            ],
        );
        let record = extract_sheet(&sheet, resolver());

        assert_eq!(record.get(Field::TotalRevenue), Some(&json!("5000")));
        assert_eq!(record.get(Field::StoreName), Some(&json!("Acme")));
        assert_eq!(record.get(Field::CartPageRevenue), Some(&json!("300")));
    }

    #[test]
    fn test_key_value_skips_short_and_blank_rows() {
        let sheet = Sheet::from_text_rows(
            "Sheet1",
            vec![
                vec!["Metric", "Value"],
                vec!["Cart Revenue"],
                vec!["Checkout", ""],
                vec!["Home Page", "12"],
            ],
        );
        let record = extract_sheet(&sheet, resolver());
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(Field::HomePageRevenue), Some(&json!("12")));
    }

    #[test]
    fn test_no_sheets_is_an_error() {
        let err = extract_workbook(&Workbook::default(), resolver()).unwrap_err();
        assert!(matches!(err, ExtractionError::NoSheets));
    }

    #[test]
    fn test_unmapped_sheet_is_an_error() {
        let workbook = Workbook {
            sheets: vec![Sheet::from_text_rows("Sheet1", vec![vec!["a", "b"], vec!["1", "2"]])],
        };
        let err = extract_workbook(&workbook, resolver()).unwrap_err();
        assert!(matches!(err, ExtractionError::UnmappedColumns));
    }

    #[test]
    fn test_csv_parsing_is_flexible() {
        let csv = "Store Name,Total Revenue,Cart Revenue\nAcme,\"$10,000\"\n";
        let workbook = Workbook::from_csv(csv.as_bytes()).unwrap();
        let sheet = &workbook.sheets[0];

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1], vec![Cell::Text("Acme".into()), Cell::Text("$10,000".into())]);
    }

    #[test]
    fn test_garbage_excel_is_malformed() {
        let err = Workbook::from_excel(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_numeric_cells_become_numbers() {
        assert_eq!(Cell::from(&Data::Int(42)).to_raw(), json!(42));
        assert_eq!(Cell::from(&Data::Float(2024.0)).to_raw(), json!(2024));
        assert_eq!(Cell::from(&Data::Float(1.5)).to_raw(), json!(1.5));
        assert!(Cell::from(&Data::String("  ".into())).is_empty());
    }

    #[test]
    fn test_excel_numbers_in_text_fields_keep_their_digits() {
        let sheet = Sheet {
            name: "Sheet1".to_string(),
            rows: vec![
                vec![Cell::from("Optimization Percent"), Cell::from("Widget 1")],
                vec![Cell::from(&Data::Int(35)), Cell::from(&Data::Float(2024.0))],
            ],
        };
        let patch = crate::normalizer::normalize(&extract_sheet(&sheet, resolver()));

        assert_eq!(patch.get(Field::OptimizationPercent), Some(&FieldValue::Text("35".into())));
        assert_eq!(patch.get(Field::Widget1Name), Some(&FieldValue::Text("2024".into())));
    }
}
