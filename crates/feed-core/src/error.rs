//! Error types for feed-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in feed-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No consistent delimiter or otherwise unusable text layout
    #[error("unrecognised layout in '{path}': {message}")]
    Format { path: PathBuf, message: String },

    /// File extension is not one we know how to read
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Workbook could not be opened or a sheet could not be read
    #[error("spreadsheet error in '{path}': {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// Workbook has no worksheets
    #[error("no worksheet found in '{0}'")]
    NoWorksheet(PathBuf),

    /// Malformed feed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute in feed XML
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Feed XML is well-formed but not an offer feed
    #[error("invalid feed document: {0}")]
    InvalidFeed(String),

    /// A post-processing rule could not be compiled
    #[error("invalid rule pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Profile name not among the built-ins
    #[error("unknown retailer profile '{0}'")]
    UnknownProfile(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
