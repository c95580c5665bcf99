//! Required-column validation with a slower retry

use crate::config::{normalize_header, ColumnNames, Field};
use crate::detect::HeaderDetector;
use crate::error::{Error, Result};
use crate::reader::TableReader;
use crate::table::{ReadMode, Table};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Resolved position of each canonical field within a header row
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<Field, usize>,
}

impl ColumnIndex {
    /// Match headers against the accepted names of every field.
    ///
    /// Aliases are tried in order; for each alias the first matching header
    /// wins.
    pub fn resolve<S: AsRef<str>>(headers: &[S], names: &ColumnNames) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();

        let mut positions = HashMap::new();
        for (field, aliases) in &names.aliases {
            let found = aliases.iter().find_map(|alias| {
                let alias = normalize_header(alias);
                normalized.iter().position(|h| *h == alias)
            });
            if let Some(pos) = found {
                positions.insert(*field, pos);
            }
        }
        Self { positions }
    }

    /// Column position of a field, if present
    pub fn get(&self, field: Field) -> Option<usize> {
        self.positions.get(&field).copied()
    }

    /// Canonical names of required fields with no matching column
    pub fn missing(&self, names: &ColumnNames) -> Vec<String> {
        Field::REQUIRED
            .iter()
            .filter(|f| !self.positions.contains_key(f))
            .map(|f| names.canonical(*f).to_string())
            .collect()
    }
}

/// A table together with its validation result
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: Table,
    pub columns: ColumnIndex,
    /// Required columns that could not be found (empty when valid)
    pub missing: Vec<String>,
    /// Mode that produced `table`
    pub mode: ReadMode,
}

impl LoadOutcome {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }

    fn from_table(table: Table, names: &ColumnNames, mode: ReadMode) -> Self {
        let columns = ColumnIndex::resolve(&table.headers(), names);
        let missing = columns.missing(names);
        Self {
            table,
            columns,
            missing,
            mode,
        }
    }
}

/// Read a file and check its required columns.
///
/// The fast read is tried first; if it lacks required columns every other
/// layout is read and the one with the fewest missing columns is kept.
/// Missing columns are reported in the outcome, not as an error.
pub fn load_validated<P: AsRef<Path>>(
    path: P,
    names: &ColumnNames,
    detector: &dyn HeaderDetector,
) -> Result<LoadOutcome> {
    let path = path.as_ref();
    let reader = TableReader::new(detector);

    let fast = match reader.read_fast(path) {
        Ok(table) => Some(LoadOutcome::from_table(table, names, ReadMode::Fast)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fast read failed, retrying full read");
            None
        }
    };

    match fast {
        Some(outcome) if outcome.is_valid() => {
            info!(
                path = %path.display(),
                header_row = outcome.table.header_row + 1,
                records = outcome.table.record_count(),
                "loaded"
            );
            return Ok(outcome);
        }
        Some(ref outcome) => debug!(
            path = %path.display(),
            missing = ?outcome.missing,
            "fast read is missing columns, retrying full read"
        ),
        None => {}
    }

    let best = reader
        .read_all(path)?
        .into_iter()
        .map(|table| LoadOutcome::from_table(table, names, ReadMode::Full))
        .min_by_key(|o| o.missing.len());

    let outcome = match (fast, best) {
        (Some(fast), Some(full)) if fast.missing.len() <= full.missing.len() => fast,
        (_, Some(full)) => full,
        (Some(fast), None) => fast,
        (None, None) => {
            return Err(Error::Format {
                path: path.to_path_buf(),
                message: "no readable table".to_string(),
            })
        }
    };

    if outcome.is_valid() {
        info!(
            path = %path.display(),
            layout = %outcome.table.layout,
            header_row = outcome.table.header_row + 1,
            records = outcome.table.record_count(),
            "loaded with full read"
        );
    } else {
        warn!(
            path = %path.display(),
            missing = ?outcome.missing,
            "required columns missing"
        );
    }
    Ok(outcome)
}
