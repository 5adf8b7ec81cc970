//! Tabular File Loading
//!
//! Loads CSV and Excel files into an in-memory [`Table`] of typed cells,
//! and provides the inspection primitives the agent's tools are built on:
//! type inference, head samples, summary statistics, column extraction.

use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;

use crate::ToolError;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// JSON rendering used in tool result envelopes.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => json!(b),
            Cell::Int(i) => json!(i),
            Cell::Float(f) => json!(f),
            Cell::Str(s) => json!(s),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => write!(f, ""),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Parse a raw CSV field into a typed cell.
///
/// Tries integer, then float, then boolean; everything else stays a string.
/// Empty fields become [`Cell::Null`].
fn parse_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Cell::Float(f);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Cell::Bool(true),
        "false" => Cell::Bool(false),
        _ => Cell::Str(trimmed.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// An in-memory tabular file: named columns over rows of typed cells.
///
/// CSV and Excel files load into the same shape, so every table tool works
/// uniformly across formats.
#[derive(Debug, Clone)]
pub struct Table {
    /// Column names, in file order.
    pub columns: Vec<String>,
    /// Row-major cell data. Every row has `columns.len()` cells.
    pub rows: Vec<Vec<Cell>>,
    /// The worksheet this table was read from (`None` for CSV).
    pub sheet_name: Option<String>,
    /// All worksheet names in the workbook (empty for CSV).
    pub all_sheets: Vec<String>,
}

impl Table {
    /// Load a tabular file, dispatching on its extension.
    ///
    /// `sheet_name` selects a worksheet for Excel files (first sheet when
    /// `None`) and is ignored for CSV. `max_rows` caps the number of data
    /// rows read.
    pub fn load(
        path: &Path,
        sheet_name: Option<&str>,
        max_rows: Option<usize>,
    ) -> Result<Self, ToolError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let table = match ext.as_str() {
            "csv" | "tsv" => Self::load_csv(path, max_rows, ext == "tsv"),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => {
                Self::load_excel(path, sheet_name, max_rows)
            }
            _ => Err(ToolError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }?;

        debug!(
            path = %path.display(),
            rows = table.rows.len(),
            columns = table.columns.len(),
            "loaded table"
        );
        Ok(table)
    }

    fn load_csv(path: &Path, max_rows: Option<usize>, tab: bool) -> Result<Self, ToolError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(if tab { b'\t' } else { b',' })
            .flexible(true)
            .from_path(path)
            .map_err(|e| match e.into_kind() {
                csv::ErrorKind::Io(io) => ToolError::io(path, io),
                other => ToolError::parse(path, format!("{other:?}")),
            })?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| ToolError::parse(path, e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let limit = max_rows.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for record in reader.records() {
            if rows.len() >= limit {
                break;
            }
            let record = record.map_err(|e| ToolError::parse(path, e.to_string()))?;
            let mut row: Vec<Cell> = record.iter().map(parse_cell).collect();
            // Ragged rows are padded or truncated to the header width.
            row.resize(columns.len(), Cell::Null);
            rows.push(row);
        }

        Ok(Self {
            columns,
            rows,
            sheet_name: None,
            all_sheets: Vec::new(),
        })
    }

    fn load_excel(
        path: &Path,
        sheet_name: Option<&str>,
        max_rows: Option<usize>,
    ) -> Result<Self, ToolError> {
        use calamine::{open_workbook_auto, Data, Reader};

        let mut workbook =
            open_workbook_auto(path).map_err(|e| ToolError::parse(path, e.to_string()))?;
        let all_sheets: Vec<String> = workbook.sheet_names().to_owned();

        let target = match sheet_name {
            Some(name) => {
                if !all_sheets.iter().any(|s| s == name) {
                    return Err(ToolError::MissingSheet {
                        sheet: name.to_string(),
                        available: all_sheets,
                    });
                }
                name.to_string()
            }
            None => all_sheets
                .first()
                .cloned()
                .ok_or_else(|| ToolError::parse(path, "workbook has no sheets"))?,
        };

        let range = workbook
            .worksheet_range(&target)
            .map_err(|e| ToolError::parse(path, e.to_string()))?;

        let mut rows_iter = range.rows();
        let columns: Vec<String> = match rows_iter.next() {
            Some(header) => header
                .iter()
                .map(|c| match c {
                    Data::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .collect(),
            None => Vec::new(),
        };

        let limit = max_rows.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for raw in rows_iter {
            if rows.len() >= limit {
                break;
            }
            let mut row: Vec<Cell> = raw
                .iter()
                .map(|c| match c {
                    Data::Empty => Cell::Null,
                    Data::Bool(b) => Cell::Bool(*b),
                    Data::Int(i) => Cell::Int(*i),
                    Data::Float(f) => {
                        // Excel stores most numbers as floats; surface whole
                        // values as integers so counts read naturally.
                        if f.fract() == 0.0 && f.abs() < 9.0e15 {
                            Cell::Int(*f as i64)
                        } else {
                            Cell::Float(*f)
                        }
                    }
                    Data::String(s) => {
                        if s.trim().is_empty() {
                            Cell::Null
                        } else {
                            Cell::Str(s.trim().to_string())
                        }
                    }
                    Data::Error(_) => Cell::Null,
                    other => Cell::Str(other.to_string()),
                })
                .collect();
            row.resize(columns.len(), Cell::Null);
            rows.push(row);
        }

        Ok(Self {
            columns,
            rows,
            sheet_name: Some(target),
            all_sheets,
        })
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Inferred type per column: `integer`, `float`, `boolean`, `string`,
    /// `mixed`, or `empty`.
    pub fn column_types(&self) -> Vec<(String, &'static str)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), self.infer_column_type(idx)))
            .collect()
    }

    fn infer_column_type(&self, idx: usize) -> &'static str {
        let mut ints = 0usize;
        let mut floats = 0usize;
        let mut bools = 0usize;
        let mut strs = 0usize;
        let mut non_null = 0usize;

        for row in &self.rows {
            match &row[idx] {
                Cell::Null => continue,
                Cell::Int(_) => ints += 1,
                Cell::Float(_) => floats += 1,
                Cell::Bool(_) => bools += 1,
                Cell::Str(_) => strs += 1,
            }
            non_null += 1;
        }

        if non_null == 0 {
            "empty"
        } else if ints == non_null {
            "integer"
        } else if ints + floats == non_null {
            "float"
        } else if bools == non_null {
            "boolean"
        } else if strs == non_null {
            "string"
        } else {
            "mixed"
        }
    }

    /// The first `n` rows as JSON records (column → value).
    pub fn head_records(&self, n: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(n)
            .map(|row| self.record_from_row(row))
            .collect()
    }

    /// A single row as a JSON record.
    pub fn record_from_row(&self, row: &[Cell]) -> Value {
        let mut map = serde_json::Map::new();
        for (name, cell) in self.columns.iter().zip(row) {
            map.insert(name.clone(), cell.to_json());
        }
        Value::Object(map)
    }

    /// Summary statistics for every numeric column:
    /// `{column: {count, mean, std, min, max}}`.
    ///
    /// `std` is the sample standard deviation; `null` when fewer than two
    /// numeric values are present.
    pub fn summary_stats(&self) -> Value {
        let mut out = serde_json::Map::new();

        for (idx, name) in self.columns.iter().enumerate() {
            let values: Vec<f64> = self
                .rows
                .iter()
                .filter_map(|row| row[idx].as_f64())
                .collect();
            if values.is_empty() {
                continue;
            }

            let count = values.len();
            let mean = values.iter().sum::<f64>() / count as f64;
            let std = if count > 1 {
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / (count - 1) as f64;
                Some(var.sqrt())
            } else {
                None
            };
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            out.insert(
                name.clone(),
                json!({
                    "count": count,
                    "mean": mean,
                    "std": std,
                    "min": min,
                    "max": max,
                }),
            );
        }

        Value::Object(out)
    }

    /// All values of a column, in row order.
    ///
    /// With `unique`, duplicates are dropped keeping first-seen order.
    /// An unknown column yields [`ToolError::UnknownColumn`] carrying the
    /// actual column list.
    pub fn column_values(&self, name: &str, unique: bool) -> Result<Vec<Cell>, ToolError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ToolError::UnknownColumn {
                column: name.to_string(),
                available: self.columns.clone(),
            })?;

        let mut values: Vec<Cell> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let cell = row[idx].clone();
            if unique && values.contains(&cell) {
                continue;
            }
            values.push(cell);
        }
        Ok(values)
    }

    /// Row indices matching a predicate expression, in row order.
    pub fn filter(&self, query: &str) -> Result<Vec<usize>, ToolError> {
        let predicate = crate::query::compile(query, &self.columns)?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| predicate.matches(row))
            .map(|(i, _)| i)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const STUDIES: &str = "patient_id,age,vessel,velocity,abnormal\n\
        P001,64,carotid,1.2,false\n\
        P002,71,renal,0.8,true\n\
        P003,58,carotid,1.5,false\n\
        P004,80,femoral,,true\n";

    #[test]
    fn load_csv_infers_types() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, None).unwrap();

        assert_eq!(table.num_rows(), 4);
        assert_eq!(table.num_columns(), 5);
        assert_eq!(
            table.columns,
            vec!["patient_id", "age", "vessel", "velocity", "abnormal"]
        );

        let types = table.column_types();
        assert_eq!(types[0], ("patient_id".to_string(), "string"));
        assert_eq!(types[1], ("age".to_string(), "integer"));
        assert_eq!(types[3], ("velocity".to_string(), "float"));
        assert_eq!(types[4], ("abnormal".to_string(), "boolean"));
    }

    #[test]
    fn max_rows_caps_reading() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, Some(2)).unwrap();
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn head_records_are_json_objects() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, None).unwrap();
        let head = table.head_records(5);
        assert_eq!(head.len(), 4);
        assert_eq!(head[0]["patient_id"], "P001");
        assert_eq!(head[0]["age"], 64);
        assert_eq!(head[3]["velocity"], serde_json::Value::Null);
    }

    #[test]
    fn summary_stats_numeric_columns_only() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, None).unwrap();
        let stats = table.summary_stats();

        let age = &stats["age"];
        assert_eq!(age["count"], 4);
        assert_eq!(age["min"], 58.0);
        assert_eq!(age["max"], 80.0);
        // velocity has one missing cell
        assert_eq!(stats["velocity"]["count"], 3);
        // string column carries no stats
        assert!(stats.get("vessel").is_none());
    }

    #[test]
    fn column_values_unique_keeps_first_seen_order() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, None).unwrap();

        let all = table.column_values("vessel", false).unwrap();
        assert_eq!(all.len(), 4);

        let unique = table.column_values("vessel", true).unwrap();
        let names: Vec<String> = unique.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["carotid", "renal", "femoral"]);
    }

    #[test]
    fn unknown_column_lists_available() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, None).unwrap();

        match table.column_values("velocty", false) {
            Err(ToolError::UnknownColumn { column, available }) => {
                assert_eq!(column, "velocty");
                assert_eq!(available, table.columns);
            }
            other => panic!("expected UnknownColumn, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        match Table::load(file.path(), None, None) {
            Err(ToolError::UnsupportedFormat { .. }) => {}
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn filter_returns_matching_row_indices() {
        let file = write_csv(STUDIES);
        let table = Table::load(file.path(), None, None).unwrap();

        let hits = table.filter("age > 60 and vessel == \"carotid\"").unwrap();
        assert_eq!(hits, vec![0]);

        let hits = table.filter("abnormal == true").unwrap();
        assert_eq!(hits, vec![1, 3]);
    }
}
