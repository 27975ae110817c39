//! CSV export of tabular report data.

use std::io::Write;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::ApiError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Column names plus rows of JSON cells.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl CsvTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// CSV writer configuration.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    /// Whether to include a header row.
    pub include_header: bool,
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self {
            include_header: true,
        }
    }
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    /// Write `table`; values containing commas, quotes or newlines are
    /// quoted with doubled quotes.
    pub fn write(&self, table: &CsvTable, output: &mut dyn Write) -> Result<(), ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(output);

        if self.include_header {
            writer.write_record(&table.columns)?;
        }

        for (i, row) in table.rows.iter().enumerate() {
            if row.len() != table.columns.len() {
                return Err(ExportError::RowWidth {
                    row: i,
                    expected: table.columns.len(),
                    actual: row.len(),
                });
            }
            writer.write_record(row.iter().map(json_value_to_csv_string))?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self, table: &CsvTable) -> Result<Vec<u8>, ExportError> {
        let mut out = Vec::new();
        self.write(table, &mut out)?;
        Ok(out)
    }
}

/// Convert a JSON value to a CSV cell.
fn json_value_to_csv_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr
            .iter()
            .map(json_value_to_csv_string)
            .collect::<Vec<_>>()
            .join(";"),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// A CSV attachment response.
#[derive(Debug, Clone)]
pub struct CsvDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl CsvDownload {
    pub fn render(filename: impl Into<String>, table: &CsvTable) -> Result<Self, ExportError> {
        Ok(Self {
            filename: filename.into(),
            bytes: CsvWriter::new().to_bytes(table)?,
        })
    }
}

impl IntoResponse for CsvDownload {
    fn into_response(self) -> Response {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            self.filename.replace(['"', '\\'], "")
        );
        let disposition = match HeaderValue::from_str(&disposition) {
            Ok(v) => v,
            Err(_) => HeaderValue::from_static("attachment; filename=\"export.csv\""),
        };
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> CsvTable {
        let mut t = CsvTable::new(["id", "name", "note"]);
        t.push(vec![json!("1"), json!("Alice"), json!(null)]);
        t.push(vec![json!("2"), json!("Bob, Jr."), json!("say \"hi\"")]);
        t.push(vec![json!(3), json!(true), json!(["a", "b"])]);
        t
    }

    #[test]
    fn n_records_give_n_plus_one_lines() {
        let csv = String::from_utf8(CsvWriter::new().to_bytes(&table()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "id,name,note");
        assert_eq!(lines[1], "1,Alice,");
        assert_eq!(lines[2], "2,\"Bob, Jr.\",\"say \"\"hi\"\"\"");
        assert_eq!(lines[3], "3,true,a;b");
    }

    #[test]
    fn empty_table_is_header_only() {
        let csv = CsvWriter::new().to_bytes(&CsvTable::new(["id"])).unwrap();
        assert_eq!(csv, b"id\n");
    }

    #[test]
    fn header_can_be_omitted() {
        let csv = CsvWriter::new().with_header(false).to_bytes(&table()).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 3);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut t = CsvTable::new(["a", "b"]);
        t.push(vec![json!(1)]);
        let err = CsvWriter::new().to_bytes(&t).unwrap_err();
        assert!(matches!(err, ExportError::RowWidth { row: 0, expected: 2, actual: 1 }));
    }

    #[test]
    fn download_sets_attachment_headers() {
        let resp = CsvDownload::render("dispatches.csv", &table()).unwrap().into_response();
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"dispatches.csv\""
        );
    }
}
