//! Input directory scanner

use crate::error::Result;
use crate::table::SourceFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A convertible file found in the input directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub format: SourceFormat,
}

/// List supported files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into. Office lock files (`~$name.xlsx`)
/// and files with other extensions are skipped.
pub fn scan_inputs<P: AsRef<Path>>(dir: P) -> Result<Vec<InputFile>> {
    let mut inputs = Vec::new();

    for entry in WalkDir::new(dir.as_ref())
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() || is_lock_file(entry.path()) {
            continue;
        }
        if let Some(format) = SourceFormat::from_path(entry.path()) {
            inputs.push(InputFile {
                path: entry.path().to_path_buf(),
                format,
            });
        }
    }

    Ok(inputs)
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_inputs_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.xlsx", "a.csv", "notes.txt", "~$b.xlsx", "C.XLS"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        fs::write(dir.path().join("nested.csv").join("inner.csv"), "x").unwrap();

        let inputs = scan_inputs(dir.path()).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|i| i.path.file_name().unwrap().to_str().unwrap())
            .collect();

        assert_eq!(names, vec!["C.XLS", "a.csv", "b.xlsx"]);
        assert_eq!(inputs[1].format, SourceFormat::Delimited);
        assert_eq!(inputs[2].format, SourceFormat::Spreadsheet);
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(scan_inputs(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        assert!(scan_inputs(dir.path().join("absent")).is_err());
    }
}
