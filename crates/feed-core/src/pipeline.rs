//! File and directory conversion
//!
//! One input file is read, validated, turned into offers and written once
//! per retailer profile. A failing file is logged and recorded in the batch
//! report; the remaining files are still converted.

use crate::builder::OfferBuilder;
use crate::detect::PhraseHeaderDetector;
use crate::error::Result;
use crate::profile::RetailerProfile;
use crate::scanner::scan_inputs;
use crate::schema::load_validated;
use crate::table::ReadMode;
use crate::xml::Feed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Outcome of converting one input file with one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: String,
    /// Data rows below the header row
    pub records: usize,
    /// Offers written to the feed
    pub offers: usize,
    /// Offers marked available
    pub available: usize,
    /// Rows without an id or a title
    pub skipped: usize,
    /// Required columns that were not found; the feed is empty when set
    pub missing_columns: Vec<String>,
    /// One-based header row
    pub header_row: usize,
    pub read_mode: ReadMode,
    /// Delimiter or sheet the table came from
    pub layout: String,
    /// Offers changed by post-processing rules
    pub rules_changed: usize,
}

/// Outcome of a whole directory run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub files: Vec<FileReport>,
    /// (input path, error message)
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn offers_written(&self) -> usize {
        self.files.iter().map(|f| f.offers).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.files.iter().all(|f| f.missing_columns.is_empty())
    }

    /// Save the report as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Result of re-running a profile's rules on an existing feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostprocessReport {
    pub offers: usize,
    pub changed: usize,
}

/// Convert one file into one feed.
///
/// A file lacking required columns still produces an empty `<offers/>`
/// document; the missing columns are listed in the report.
pub fn convert_file(input: &Path, output: &Path, profile: &RetailerProfile) -> Result<FileReport> {
    let detector = PhraseHeaderDetector::default();
    let outcome = load_validated(input, &profile.builder.columns, &detector)?;

    let mut report = FileReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        profile: profile.name.clone(),
        records: outcome.table.record_count(),
        offers: 0,
        available: 0,
        skipped: 0,
        missing_columns: outcome.missing.clone(),
        header_row: outcome.table.header_row + 1,
        read_mode: outcome.mode,
        layout: outcome.table.layout.to_string(),
        rules_changed: 0,
    };

    let mut feed = if outcome.is_valid() {
        let headers = outcome.table.headers();
        let builder = OfferBuilder::new(&profile.builder, &outcome.columns, &headers);
        let mut offers = Vec::with_capacity(outcome.table.record_count());
        for record in &outcome.table.records {
            match builder.build(record) {
                Some(offer) => offers.push(offer),
                None => report.skipped += 1,
            }
        }
        if report.skipped > 0 {
            warn!(
                path = %input.display(),
                skipped = report.skipped,
                "rows without id or title skipped"
            );
        }
        Feed::from_offers(&offers, profile.builder.description.cdata)
    } else {
        warn!(
            path = %input.display(),
            profile = %profile.name,
            missing = ?outcome.missing,
            "writing empty feed"
        );
        Feed::default()
    };

    report.rules_changed = profile.apply(&mut feed)?;
    report.offers = feed.offers.len();
    report.available = feed.offers.iter().filter(|o| o.avail == "1").count();

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    feed.save(output)?;

    info!(
        path = %output.display(),
        profile = %profile.name,
        offers = report.offers,
        available = report.available,
        "feed written"
    );
    Ok(report)
}

/// Convert every supported file in `input_dir` with every profile
pub fn convert_directory(
    input_dir: &Path,
    output_dir: &Path,
    profiles: &[RetailerProfile],
) -> Result<BatchReport> {
    let started_at = Utc::now();
    fs::create_dir_all(output_dir)?;

    let inputs = scan_inputs(input_dir)?;
    if inputs.is_empty() {
        info!(dir = %input_dir.display(), "no input files found");
    }

    let mut files = Vec::new();
    let mut errors = Vec::new();

    for input in &inputs {
        for profile in profiles {
            let output = profile.output_path(&input.path, output_dir);
            match convert_file(&input.path, &output, profile) {
                Ok(report) => files.push(report),
                Err(e) => {
                    error!(
                        path = %input.path.display(),
                        profile = %profile.name,
                        error = %e,
                        "conversion failed"
                    );
                    errors.push((input.path.clone(), e.to_string()));
                }
            }
        }
    }

    Ok(BatchReport {
        started_at,
        finished_at: Utc::now(),
        input_dir: input_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        files,
        errors,
    })
}

/// Re-apply a profile's rules to a feed written earlier
pub fn postprocess_file(
    input: &Path,
    output: &Path,
    profile: &RetailerProfile,
) -> Result<PostprocessReport> {
    let mut feed = Feed::load(input)?;
    let changed = profile.apply(&mut feed)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    feed.save(output)?;

    info!(
        path = %output.display(),
        profile = %profile.name,
        changed,
        "feed post-processed"
    );
    Ok(PostprocessReport {
        offers: feed.offers.len(),
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "ID oferty;Tytuł oferty;Cena PL;Link do oferty;Status oferty;\
                          Liczba sztuk;Kategoria główna;Opis oferty;Stan";

    fn write_export(dir: &Path, name: &str) -> PathBuf {
        let content = format!(
            "{}\n\
             101;ThinkPad T480 używany;1 299,00;https://allegro.pl/oferta/101;aktywna;12;Laptopy;<p>Używany</p>;Używany\n\
             102;Dell E7470;899;https://allegro.pl/oferta/102;aktywna;6;Laptopy;;Używany\n\
             ;;0;;zakończona;0;Laptopy;;\n\
             103;HP 800 G3;450;https://allegro.pl/oferta/103;zakończona;3;Komputery;;\n",
            HEADER
        );
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_convert_file_base() {
        let dir = TempDir::new().unwrap();
        let input = write_export(dir.path(), "oferty.csv");
        let output = dir.path().join("out").join("oferty.xml");

        let report = convert_file(&input, &output, &RetailerProfile::base()).unwrap();
        assert_eq!(report.records, 4);
        assert_eq!(report.offers, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.available, 2);
        assert_eq!(report.header_row, 1);
        assert_eq!(report.read_mode, ReadMode::Fast);
        assert!(report.missing_columns.is_empty());

        let feed = Feed::load(&output).unwrap();
        assert_eq!(feed.offers[0].id, "101");
        assert_eq!(feed.offers[0].price, "1299.00");
        assert_eq!(feed.offers[2].avail, "99");
    }

    #[test]
    fn test_convert_file_profile_threshold() {
        let dir = TempDir::new().unwrap();
        let input = write_export(dir.path(), "oferty.csv");
        let output = dir.path().join("oferty_morele.xml");

        let report = convert_file(&input, &output, &RetailerProfile::morele()).unwrap();
        assert_eq!(report.available, 2);

        let output = dir.path().join("oferty_taniey.xml");
        let report = convert_file(&input, &output, &RetailerProfile::taniey()).unwrap();
        assert_eq!(report.available, 1);
        assert_eq!(report.rules_changed, 3);

        let xml = fs::read_to_string(&output).unwrap();
        assert!(xml.contains("Laptopy poleasingowe"));
        assert!(xml.contains("<![CDATA[<p>Używany</p>"));
    }

    #[test]
    fn test_missing_columns_write_empty_feed() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.csv");
        fs::write(&input, "ID oferty;Tytuł oferty\n1;Laptop\n").unwrap();
        let output = dir.path().join("bad.xml");

        let report = convert_file(&input, &output, &RetailerProfile::base()).unwrap();
        assert_eq!(report.offers, 0);
        assert!(report.missing_columns.contains(&"Cena PL".to_string()));

        let xml = fs::read_to_string(&output).unwrap();
        assert!(xml.contains("<offers/>"));
    }

    #[test]
    fn test_convert_directory_continues_after_failure() {
        let input_dir = TempDir::new().unwrap();
        let output_dir = TempDir::new().unwrap();
        write_export(input_dir.path(), "a.csv");
        fs::write(input_dir.path().join("b.xlsx"), "not a workbook").unwrap();
        write_export(input_dir.path(), "c.csv");

        let profiles = vec![RetailerProfile::base(), RetailerProfile::swop()];
        let report = convert_directory(input_dir.path(), output_dir.path(), &profiles).unwrap();

        assert_eq!(report.files.len(), 4);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|(p, _)| p.ends_with("b.xlsx")));
        assert!(!report.is_clean());
        assert!(report.started_at <= report.finished_at);
        assert!(output_dir.path().join("a.xml").exists());
        assert!(output_dir.path().join("c_swop.xml").exists());
        assert_eq!(report.offers_written(), 12);
    }

    #[test]
    fn test_convert_empty_directory() {
        let input_dir = TempDir::new().unwrap();
        let output_dir = TempDir::new().unwrap();
        let out = output_dir.path().join("feeds");
        let report = convert_directory(input_dir.path(), &out, &[RetailerProfile::base()]).unwrap();
        assert!(report.files.is_empty());
        assert!(report.is_clean());
        assert!(out.is_dir());
    }

    #[test]
    fn test_postprocess_file_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let input = write_export(dir.path(), "oferty.csv");
        let base = dir.path().join("oferty.xml");
        convert_file(&input, &base, &RetailerProfile::base()).unwrap();

        let once = dir.path().join("once.xml");
        let twice = dir.path().join("twice.xml");
        let profile = RetailerProfile::swop();
        let first = postprocess_file(&base, &once, &profile).unwrap();
        let second = postprocess_file(&once, &twice, &profile).unwrap();

        assert_eq!(first.offers, 3);
        assert!(first.changed > 0);
        assert_eq!(second.changed, 0);
        assert_eq!(
            fs::read_to_string(&once).unwrap(),
            fs::read_to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_batch_report_save() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let report = BatchReport {
            started_at: now,
            finished_at: now,
            input_dir: dir.path().to_path_buf(),
            output_dir: dir.path().to_path_buf(),
            files: vec![],
            errors: vec![(PathBuf::from("x.csv"), "boom".to_string())],
        };
        let path = dir.path().join("report.json");
        report.save(&path).unwrap();
        let loaded: BatchReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.errors, report.errors);
    }
}
