//! Tabular types produced by the reader

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// `.xls`, `.xlsx`, `.xlsm` and friends
    Spreadsheet,
    /// Delimited text (`.csv`)
    Delimited,
}

impl SourceFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(SourceFormat::Spreadsheet),
            "csv" => Some(SourceFormat::Delimited),
            _ => None,
        }
    }
}

/// How much effort the reader spends finding the right layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Sniffed delimiter, first worksheet
    Fast,
    /// Every delimiter candidate, every worksheet
    Full,
}

/// A table read from a single source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Header columns, in file order
    pub columns: Vec<Column>,
    /// Non-empty data rows
    pub records: Vec<RawRecord>,
    /// Source file path
    pub source_path: PathBuf,
    /// Zero-based row index the headers were taken from
    pub header_row: usize,
    /// Where the rows came from: delimiter for text, sheet name for workbooks
    pub layout: Layout,
}

impl Table {
    /// Create a new empty table
    pub fn new(source_path: PathBuf, layout: Layout) -> Self {
        Self {
            columns: Vec::new(),
            records: Vec::new(),
            source_path,
            header_row: 0,
            layout,
        }
    }

    /// Build a table from a header row and the rows below it.
    ///
    /// Headers are trimmed, rows are padded or truncated to header width and
    /// rows whose cells are all blank are dropped.
    pub fn from_grid(
        source_path: PathBuf,
        layout: Layout,
        header_row: usize,
        headers: &[String],
        rows: impl IntoIterator<Item = Vec<String>>,
    ) -> Self {
        let columns: Vec<Column> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(name.trim().to_string(), i))
            .collect();

        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let records = rows
            .into_iter()
            .filter_map(|cells| {
                let values: Vec<String> = (0..names.len())
                    .map(|i| cells.get(i).map(|v| v.trim().to_string()).unwrap_or_default())
                    .collect();
                if values.iter().all(|v| v.is_empty()) {
                    None
                } else {
                    Some(RawRecord::new(names.iter().cloned().zip(values).collect()))
                }
            })
            .collect();

        Self {
            columns,
            records,
            source_path,
            header_row,
            layout,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Header names, in file order
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Find a column by exact name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True if any data cell holds a value
    pub fn has_values(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.fields.iter().any(|(_, v)| !v.is_empty()))
    }
}

/// Where a table's rows were read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// Delimited text with the given delimiter
    Delimited { delimiter: char },
    /// A worksheet, optionally re-read from formula text
    Sheet { name: String, formulas: bool },
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Delimited { delimiter: '\t' } => write!(f, "delimited (tab)"),
            Layout::Delimited { delimiter } => write!(f, "delimited ('{}')", delimiter),
            Layout::Sheet { name, formulas: false } => write!(f, "sheet '{}'", name),
            Layout::Sheet { name, formulas: true } => write!(f, "sheet '{}' (formula text)", name),
        }
    }
}

/// A column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Header text, trimmed
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// One data row: header to trimmed cell value, in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub fields: Vec<(String, String)>,
}

impl RawRecord {
    /// Create a record from header/value pairs
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Value under an exact header name. The first duplicate header wins.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    /// Value at a column position
    pub fn at(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|(_, v)| v.as_str())
    }

    /// Iterate over header/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }
}
