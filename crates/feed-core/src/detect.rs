//! Layout detection: delimiter sniffing and header-row location
//!
//! Both are heuristics over the first few lines of a file. Header detection
//! sits behind [`HeaderDetector`] so the builder never depends on a
//! particular strategy.

use std::collections::HashMap;

/// Delimiters tried when sniffing delimited text, in tie-break order
pub const DELIMITER_CANDIDATES: &[char] = &[';', ',', '|', '\t'];

/// Number of non-blank lines sampled when sniffing
pub const SNIFF_LINES: usize = 10;

/// Infer the delimiter of a text sample.
///
/// For each candidate, occurrences outside double quotes are counted per
/// line. The candidate whose most common non-zero count is shared by the
/// most lines wins. Returns `None` when no candidate appears at all.
pub fn sniff_delimiter(sample: &str) -> Option<char> {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best: Option<(char, usize, usize)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let mut frequency: HashMap<usize, usize> = HashMap::new();
        for line in &lines {
            let count = count_unquoted(line, candidate);
            if count > 0 {
                *frequency.entry(count).or_default() += 1;
            }
        }

        // (lines agreeing on the modal count, the modal count itself)
        let Some((mode, agreeing)) = frequency
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        else {
            continue;
        };

        let better = match best {
            None => true,
            Some((_, best_agreeing, best_mode)) => {
                agreeing > best_agreeing || (agreeing == best_agreeing && mode > best_mode)
            }
        };
        if better {
            best = Some((candidate, agreeing, mode));
        }
    }

    best.map(|(c, _, _)| c)
}

/// Count `delimiter` outside of double-quoted spans
fn count_unquoted(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Result of header detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMatch {
    /// Zero-based row index holding the headers
    pub row: usize,
    /// False when the fallback row was used
    pub detected: bool,
}

/// Locates the header row in a grid of cells
pub trait HeaderDetector {
    /// Pick the header row among `rows`, scanning at most `scan_limit` of them
    fn detect(&self, rows: &[Vec<String>], scan_limit: usize) -> HeaderMatch;
}

/// Finds the first row containing a known header phrase.
///
/// Cells are lower-cased and joined with ` | ` before a substring search, so
/// phrases match regardless of which cell they sit in.
#[derive(Debug, Clone)]
pub struct PhraseHeaderDetector {
    /// Lower-case fragments of known column names
    pub phrases: Vec<String>,
    /// Row used when no phrase matches (if the grid is long enough)
    pub fallback_row: usize,
}

impl Default for PhraseHeaderDetector {
    fn default() -> Self {
        Self {
            phrases: vec![
                "id oferty".to_string(),
                "tytuł oferty".to_string(),
                "tytuł_oferty".to_string(),
            ],
            fallback_row: 3,
        }
    }
}

impl HeaderDetector for PhraseHeaderDetector {
    fn detect(&self, rows: &[Vec<String>], scan_limit: usize) -> HeaderMatch {
        for (i, row) in rows.iter().take(scan_limit).enumerate() {
            let joined = row
                .iter()
                .map(|c| c.trim().to_lowercase())
                .collect::<Vec<_>>()
                .join(" | ");
            if self.phrases.iter().any(|p| joined.contains(p.as_str())) {
                return HeaderMatch {
                    row: i,
                    detected: true,
                };
            }
        }

        let row = if rows.len() > self.fallback_row {
            self.fallback_row
        } else {
            0
        };
        HeaderMatch {
            row,
            detected: false,
        }
    }
}
