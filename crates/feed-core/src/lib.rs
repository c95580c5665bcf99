//! feed-core: Core library for turning marketplace offer exports into XML feeds
//!
//! This library provides functionality to:
//! - Read offer exports from spreadsheets and delimited text, locating the
//!   delimiter, worksheet and header row on its own
//! - Validate required columns, retrying with a slower full read
//! - Build offers (availability, category, images, attributes, description)
//! - Transcode structured JSON descriptions into HTML
//! - Write and read the `<offers>` XML feed
//! - Apply retailer-specific post-processing rules idempotently
//! - Convert whole directories with per-file error reporting

pub mod builder;
pub mod config;
pub mod description;
pub mod detect;
pub mod error;
pub mod footer;
pub mod offer;
pub mod pipeline;
pub mod profile;
pub mod reader;
pub mod rules;
pub mod scanner;
pub mod schema;
pub mod table;
pub mod xml;

pub use builder::OfferBuilder;
pub use config::{
    AttributeMap, AttributeMode, AvailabilityPolicy, BuilderConfig, CategoryPolicy, ColumnNames,
    DescriptionOptions, Field, HeuristicAttributes, QuantityThreshold,
};
pub use description::{transcode, Transcoded};
pub use detect::{sniff_delimiter, HeaderDetector, HeaderMatch, PhraseHeaderDetector};
pub use error::{Error, Result};
pub use footer::{FooterTemplate, LinkBlock};
pub use offer::{Availability, Offer};
pub use pipeline::{
    convert_directory, convert_file, postprocess_file, BatchReport, FileReport, PostprocessReport,
};
pub use profile::RetailerProfile;
pub use reader::TableReader;
pub use rules::{PostProcessor, Rule, RuleSet};
pub use scanner::{scan_inputs, InputFile};
pub use schema::{load_validated, ColumnIndex, LoadOutcome};
pub use table::{Column, Layout, RawRecord, ReadMode, SourceFormat, Table};
pub use xml::{Feed, OfferElement};
