//! Tabular reader for offer exports (delimited text and workbooks)

use crate::detect::{sniff_delimiter, HeaderDetector, DELIMITER_CANDIDATES};
use crate::error::{Error, Result};
use crate::table::{Layout, SourceFormat, Table};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Rows scanned for headers in a worksheet
pub const SHEET_HEADER_SCAN: usize = 20;

/// Lines scanned for headers in delimited text
pub const TEXT_HEADER_SCAN: usize = 30;

/// Worksheet tried first in full mode
pub const PREFERRED_SHEET: &str = "Szablon";

type Workbook = Sheets<std::io::BufReader<fs::File>>;

/// Reads offer exports into [`Table`]s using a pluggable header detector
pub struct TableReader<'a> {
    detector: &'a dyn HeaderDetector,
}

impl<'a> TableReader<'a> {
    pub fn new(detector: &'a dyn HeaderDetector) -> Self {
        Self { detector }
    }

    /// Read with the cheapest layout guess: sniffed delimiter or first sheet
    pub fn read_fast<P: AsRef<Path>>(&self, path: P) -> Result<Table> {
        let path = path.as_ref();
        match source_format(path)? {
            SourceFormat::Delimited => {
                let text = read_text(path)?;
                let delimiter = sniff_delimiter(&text).ok_or_else(|| Error::Format {
                    path: path.to_path_buf(),
                    message: format!(
                        "no consistent delimiter among {:?} in the first lines",
                        DELIMITER_CANDIDATES
                    ),
                })?;
                debug!(path = %path.display(), delimiter = ?delimiter, "sniffed delimiter");
                self.parse_text(&text, delimiter, path)
            }
            SourceFormat::Spreadsheet => {
                let mut workbook = open_workbook_auto(path).map_err(|e| Error::Spreadsheet {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let first = workbook
                    .sheet_names()
                    .to_owned()
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::NoWorksheet(path.to_path_buf()))?;
                self.read_sheet(&mut workbook, &first, path)
            }
        }
    }

    /// Read every plausible layout: each delimiter candidate present in the
    /// text, or each worksheet (the preferred sheet first).
    ///
    /// Candidates that fail to parse are skipped; if all fail, the first
    /// error is returned.
    pub fn read_all<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Table>> {
        let path = path.as_ref();
        let mut tables = Vec::new();
        let mut first_error = None;

        match source_format(path)? {
            SourceFormat::Delimited => {
                let text = read_text(path)?;
                for &delimiter in DELIMITER_CANDIDATES {
                    if !text.contains(delimiter) {
                        continue;
                    }
                    match self.parse_text(&text, delimiter, path) {
                        Ok(table) => tables.push(table),
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
            SourceFormat::Spreadsheet => {
                let mut workbook = open_workbook_auto(path).map_err(|e| Error::Spreadsheet {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let mut names = workbook.sheet_names().to_owned();
                if let Some(pos) = names.iter().position(|n| n == PREFERRED_SHEET) {
                    let preferred = names.remove(pos);
                    names.insert(0, preferred);
                }
                for name in &names {
                    match self.read_sheet(&mut workbook, name, path) {
                        Ok(table) => tables.push(table),
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
        }

        if tables.is_empty() {
            return Err(first_error.unwrap_or_else(|| Error::Format {
                path: path.to_path_buf(),
                message: "no readable layout found".to_string(),
            }));
        }
        Ok(tables)
    }

    /// Parse delimited text from a string (useful for testing)
    pub fn parse_text(&self, text: &str, delimiter: char, path: &Path) -> Result<Table> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();

        // Header detection runs on raw lines, before CSV parsing.
        let line_rows: Vec<Vec<String>> = lines.iter().map(|l| vec![l.to_string()]).collect();
        let found = self.detector.detect(&line_rows, TEXT_HEADER_SCAN);
        if !found.detected {
            warn!(
                path = %path.display(),
                row = found.row + 1,
                "no header phrase found, assuming fixed header line"
            );
        }

        let body: String = lines.iter().skip(found.row).copied().collect();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter as u8)
            .from_reader(body.as_bytes());

        let mut grid = Vec::new();
        for result in csv_reader.records() {
            let record = result.map_err(|e| Error::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            grid.push(record.iter().map(str::to_string).collect::<Vec<String>>());
        }

        let mut rows = grid.into_iter();
        let headers = rows.next().unwrap_or_default();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(Error::Format {
                path: path.to_path_buf(),
                message: "no columns found".to_string(),
            });
        }

        Ok(Table::from_grid(
            path.to_path_buf(),
            Layout::Delimited { delimiter },
            found.row,
            &headers,
            rows,
        ))
    }

    fn read_sheet(&self, workbook: &mut Workbook, name: &str, path: &Path) -> Result<Table> {
        let values = workbook.worksheet_range(name).map_err(|e| Error::Spreadsheet {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(self.sheet_table(
            &values,
            || match workbook.worksheet_formula(name) {
                Ok(formulas) => Some(formulas),
                Err(e) => {
                    debug!(path = %path.display(), sheet = name, error = %e, "no formula data");
                    None
                }
            },
            name,
            path,
        ))
    }

    /// Build a sheet's table from cached values. Formulas are only loaded
    /// when the header row has columns but every data cell is empty.
    fn sheet_table<F>(
        &self,
        values: &Range<Data>,
        formulas: F,
        name: &str,
        path: &Path,
    ) -> Table
    where
        F: FnOnce() -> Option<Range<String>>,
    {
        let table = self.table_from_grid(sheet_grid(values, None), name, false, path);
        if table.has_values() || table.columns.is_empty() {
            return table;
        }

        // Cached formula results can be missing (e.g. never recalculated);
        // fall back to the formula text itself.
        let Some(formulas) = formulas() else {
            return table;
        };
        if formulas.used_cells().all(|(_, _, f)| f.is_empty()) {
            return table;
        }

        warn!(
            path = %path.display(),
            sheet = name,
            "cached cell values are empty, re-reading formula text"
        );
        self.table_from_grid(sheet_grid(values, Some(&formulas)), name, true, path)
    }

    fn table_from_grid(
        &self,
        grid: Vec<Vec<String>>,
        sheet: &str,
        formulas: bool,
        path: &Path,
    ) -> Table {
        let layout = Layout::Sheet {
            name: sheet.to_string(),
            formulas,
        };
        if grid.is_empty() {
            return Table::new(path.to_path_buf(), layout);
        }

        let found = self.detector.detect(&grid, SHEET_HEADER_SCAN);
        if !found.detected {
            warn!(
                path = %path.display(),
                sheet,
                row = found.row + 1,
                "no header phrase found, assuming fixed header row"
            );
        }

        let mut rows = grid.into_iter().skip(found.row);
        let headers = rows.next().unwrap_or_default();
        Table::from_grid(path.to_path_buf(), layout, found.row, &headers, rows)
    }
}

fn source_format(path: &Path) -> Result<SourceFormat> {
    SourceFormat::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))
}

/// Read a text file as UTF-8, replacing invalid sequences and dropping a BOM
fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Lay a worksheet out as rows from A1, so row indices match the sheet.
/// Empty cached cells fall back to formula text when formulas are given.
fn sheet_grid(values: &Range<Data>, formulas: Option<&Range<String>>) -> Vec<Vec<String>> {
    let end = [values.end(), formulas.and_then(|f| f.end())]
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<(u32, u32)>, (r, c)| match acc {
            None => Some((r, c)),
            Some((ar, ac)) => Some((ar.max(r), ac.max(c))),
        });
    let Some((last_row, last_col)) = end else {
        return Vec::new();
    };

    (0..=last_row)
        .map(|r| {
            (0..=last_col)
                .map(|c| {
                    let cached = values.get_value((r, c)).map(cell_text).unwrap_or_default();
                    if !cached.is_empty() {
                        return cached;
                    }
                    formulas
                        .and_then(|f| f.get_value((r, c)))
                        .filter(|f| !f.is_empty())
                        .map(|f| format!("={}", f))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnNames;
    use crate::detect::PhraseHeaderDetector;
    use crate::schema::load_validated;
    use crate::table::ReadMode;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::TempDir;

    const REQUIRED_HEADERS: &[&str] = &[
        "ID oferty",
        "Tytuł oferty",
        "Cena PL",
        "Link do oferty",
        "Status oferty",
        "Liczba sztuk",
        "Kategoria główna",
    ];

    /// Write an .xlsx with one sheet per (name, rows) entry, in order
    fn write_workbook(dir: &Path, sheets: &[(&str, Vec<Vec<&str>>)]) -> std::path::PathBuf {
        let mut workbook = XlsxWorkbook::new();
        for (name, rows) in sheets {
            let sheet = workbook.add_worksheet();
            sheet.set_name(*name).unwrap();
            for (r, row) in rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    sheet.write_string(r as u32, c as u16, *cell).unwrap();
                }
            }
        }
        let path = dir.join("oferty.xlsx");
        workbook.save(&path).unwrap();
        path
    }

    fn offer_rows(preamble: usize) -> Vec<Vec<&'static str>> {
        let mut rows = vec![vec!["Eksport ofert"]; preamble];
        rows.push(REQUIRED_HEADERS.to_vec());
        rows.push(vec![
            "101",
            "ThinkPad T480",
            "1299",
            "https://allegro.pl/oferta/101",
            "aktywna",
            "3",
            "Laptopy",
        ]);
        rows
    }

    fn sheet_name(table: &Table) -> &str {
        match &table.layout {
            Layout::Sheet { name, .. } => name.as_str(),
            Layout::Delimited { .. } => "",
        }
    }

    fn parse(text: &str, delimiter: char) -> Table {
        let detector = PhraseHeaderDetector::default();
        TableReader::new(&detector)
            .parse_text(text, delimiter, Path::new("test.csv"))
            .unwrap()
    }

    #[test]
    fn test_parse_header_after_preamble() {
        let text = "Eksport\nKonto: sklep\n\nID oferty;Tytuł oferty;Cena PL\n1;Laptop;100\n;;\n2;Monitor;200\n";
        let table = parse(text, ';');

        assert_eq!(table.header_row, 3);
        assert_eq!(table.headers(), vec!["ID oferty", "Tytuł oferty", "Cena PL"]);
        assert_eq!(table.record_count(), 2);
        assert_eq!(table.records[1].get("Tytuł oferty"), Some("Monitor"));
    }

    #[test]
    fn test_parse_without_phrase_uses_fourth_line() {
        let text = "a\nb\nc\nkol1,kol2\nx,y\n";
        let table = parse(text, ',');

        assert_eq!(table.header_row, 3);
        assert_eq!(table.headers(), vec!["kol1", "kol2"]);
        assert_eq!(table.records[0].get("kol2"), Some("y"));
    }

    #[test]
    fn test_parse_quoted_and_short_rows() {
        let text = "ID oferty,Opis oferty,Cena PL\n1,\"<p>a, b</p>\"\n";
        let table = parse(text, ',');

        assert_eq!(table.records[0].get("Opis oferty"), Some("<p>a, b</p>"));
        assert_eq!(table.record_count(), 0);
    }

    #[test]
    fn test_read_fast_sniffs_delimiter_and_strips_bom() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "\u{feff}ID oferty|Tytuł oferty\n1|A\n2|B\n").unwrap();

        let detector = PhraseHeaderDetector::default();
        let table = TableReader::new(&detector).read_fast(file.path()).unwrap();

        assert_eq!(table.layout, Layout::Delimited { delimiter: '|' });
        assert_eq!(table.headers(), vec!["ID oferty", "Tytuł oferty"]);
        assert_eq!(table.record_count(), 2);
    }

    #[test]
    fn test_read_fast_fails_without_delimiter() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "one\ntwo\nthree\n").unwrap();

        let detector = PhraseHeaderDetector::default();
        let err = TableReader::new(&detector).read_fast(file.path()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_read_all_tries_each_delimiter() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "ID oferty;Tytuł oferty,x\n1;A,b\n").unwrap();

        let detector = PhraseHeaderDetector::default();
        let tables = TableReader::new(&detector).read_all(file.path()).unwrap();
        let layouts: Vec<_> = tables.iter().map(|t| t.layout.clone()).collect();

        assert_eq!(
            layouts,
            vec![
                Layout::Delimited { delimiter: ';' },
                Layout::Delimited { delimiter: ',' }
            ]
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let detector = PhraseHeaderDetector::default();
        let err = TableReader::new(&detector)
            .read_fast("notes.txt")
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_read_all_puts_template_sheet_first() {
        let dir = TempDir::new().unwrap();
        let path = write_workbook(
            dir.path(),
            &[
                ("Notatki", vec![vec!["uwagi"]]),
                ("Dane", offer_rows(0)),
                (PREFERRED_SHEET, offer_rows(2)),
            ],
        );

        let detector = PhraseHeaderDetector::default();
        let tables = TableReader::new(&detector).read_all(&path).unwrap();
        let names: Vec<&str> = tables.iter().map(sheet_name).collect();
        assert_eq!(names, vec![PREFERRED_SHEET, "Notatki", "Dane"]);

        let template = &tables[0];
        assert_eq!(template.header_row, 2);
        assert_eq!(template.record_count(), 1);
        assert_eq!(template.records[0].get("Tytuł oferty"), Some("ThinkPad T480"));
        assert_eq!(tables[2].header_row, 0);
    }

    #[test]
    fn test_sheet_without_phrase_uses_fourth_row() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            vec!["a"],
            vec!["b"],
            vec!["c"],
            vec!["kol1", "kol2"],
            vec!["x", "y"],
        ];
        let path = write_workbook(dir.path(), &[("Arkusz1", rows)]);

        let detector = PhraseHeaderDetector::default();
        let table = TableReader::new(&detector).read_fast(&path).unwrap();
        assert_eq!(table.header_row, 3);
        assert_eq!(table.headers(), vec!["kol1", "kol2"]);
        assert_eq!(table.records[0].get("kol2"), Some("y"));
    }

    #[test]
    fn test_load_validated_falls_back_to_template_sheet() {
        let dir = TempDir::new().unwrap();
        let path = write_workbook(
            dir.path(),
            &[
                ("Instrukcja", vec![vec!["ID oferty", "Opis"], vec!["1", "x"]]),
                (PREFERRED_SHEET, offer_rows(1)),
            ],
        );

        let detector = PhraseHeaderDetector::default();
        let outcome = load_validated(&path, &ColumnNames::default(), &detector).unwrap();
        assert!(outcome.is_valid());
        assert_eq!(outcome.mode, ReadMode::Full);
        assert_eq!(sheet_name(&outcome.table), PREFERRED_SHEET);
        assert_eq!(outcome.table.header_row, 1);
    }

    #[test]
    fn test_sheet_table_reads_formulas_when_values_are_empty() {
        let mut values: Range<Data> = Range::new((0, 0), (1, 1));
        values.set_value((0, 0), Data::String("ID oferty".to_string()));
        values.set_value((0, 1), Data::String("Cena PL".to_string()));
        let mut formulas: Range<String> = Range::new((1, 0), (1, 1));
        formulas.set_value((1, 0), "ROW()".to_string());
        formulas.set_value((1, 1), "B1*2".to_string());

        let detector = PhraseHeaderDetector::default();
        let reader = TableReader::new(&detector);
        let path = Path::new("oferty.xlsx");

        let table = reader.sheet_table(&values, || Some(formulas.clone()), "Arkusz1", path);
        assert_eq!(
            table.layout,
            Layout::Sheet {
                name: "Arkusz1".to_string(),
                formulas: true
            }
        );
        assert_eq!(table.records[0].get("Cena PL"), Some("=B1*2"));

        let blank: Range<String> = Range::new((1, 0), (1, 1));
        let table = reader.sheet_table(&values, || Some(blank), "Arkusz1", path);
        assert_eq!(
            table.layout,
            Layout::Sheet {
                name: "Arkusz1".to_string(),
                formulas: false
            }
        );
        assert_eq!(table.records[0].get("Cena PL"), Some(""));
    }

    #[test]
    fn test_sheet_table_skips_formulas_when_values_present() {
        let mut values: Range<Data> = Range::new((0, 0), (1, 0));
        values.set_value((0, 0), Data::String("ID oferty".to_string()));
        values.set_value((1, 0), Data::Float(7.0));

        let detector = PhraseHeaderDetector::default();
        let loaded = Cell::new(false);
        let table = TableReader::new(&detector).sheet_table(
            &values,
            || {
                loaded.set(true);
                None
            },
            "Arkusz1",
            Path::new("oferty.xlsx"),
        );
        assert!(!loaded.get());
        assert_eq!(table.records[0].get("ID oferty"), Some("7"));
    }

    #[test]
    fn test_sheet_grid_formula_fallback() {
        let mut values: Range<Data> = Range::new((0, 0), (1, 1));
        values.set_value((0, 0), Data::String("ID oferty".to_string()));
        values.set_value((0, 1), Data::String("Cena PL".to_string()));
        let mut formulas: Range<String> = Range::new((1, 0), (1, 1));
        formulas.set_value((1, 0), "ROW()".to_string());
        formulas.set_value((1, 1), "B1*2".to_string());

        let grid = sheet_grid(&values, Some(&formulas));
        assert_eq!(grid[0], vec!["ID oferty", "Cena PL"]);
        assert_eq!(grid[1], vec!["=ROW()", "=B1*2"]);

        let cached_only = sheet_grid(&values, None);
        assert_eq!(cached_only[1], vec!["", ""]);
    }
}
