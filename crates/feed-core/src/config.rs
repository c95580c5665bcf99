//! Builder configuration: column names, attribute tables and policies
//!
//! Everything here is plain data passed into [`crate::builder::OfferBuilder`]
//! and [`crate::profile::RetailerProfile`]; there is no global state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalise a header for comparison: trim, lower-case, `_` as space,
/// collapse inner whitespace.
pub fn normalize_header(header: &str) -> String {
    header
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonical offer fields that come from dedicated columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    Title,
    Price,
    Url,
    Status,
    Quantity,
    Category,
    SubCategory,
    Sku,
    Images,
    Description,
}

impl Field {
    /// Fields that must be present for a file to be converted
    pub const REQUIRED: [Field; 7] = [
        Field::Id,
        Field::Title,
        Field::Price,
        Field::Url,
        Field::Status,
        Field::Quantity,
        Field::Category,
    ];
}

/// Accepted header names per canonical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNames {
    /// (field, accepted header names; the first is the canonical one)
    pub aliases: Vec<(Field, Vec<String>)>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        let entry = |field, names: &[&str]| {
            (field, names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
        };
        Self {
            aliases: vec![
                entry(Field::Id, &["ID oferty", "Id"]),
                entry(Field::Title, &["Tytuł oferty", "Nazwa"]),
                entry(Field::Price, &["Cena PL", "Cena"]),
                entry(Field::Url, &["Link do oferty", "URL oferty"]),
                entry(Field::Status, &["Status oferty"]),
                entry(Field::Quantity, &["Liczba sztuk", "Ilość"]),
                entry(Field::Category, &["Kategoria główna"]),
                entry(Field::SubCategory, &["Podkategoria", "Kategoria podrzędna"]),
                entry(Field::Sku, &["Sygnatura/SKU Sprzedającego", "SKU", "Sygnatura"]),
                entry(Field::Images, &["Zdjęcia", "Zdjęcia oferty"]),
                entry(Field::Description, &["Opis oferty", "Opis"]),
            ],
        }
    }
}

impl ColumnNames {
    /// Canonical (first) header name of a field
    pub fn canonical(&self, field: Field) -> &str {
        self.aliases
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, names)| names.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Header names accepted for a field
    pub fn names(&self, field: Field) -> &[String] {
        self.aliases
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[])
    }

    /// True if the header names one of the dedicated fields
    pub fn is_core_header(&self, header: &str) -> bool {
        let norm = normalize_header(header);
        self.aliases
            .iter()
            .flat_map(|(_, names)| names)
            .any(|n| normalize_header(n) == norm)
    }
}

/// Static map from spreadsheet column to attribute name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMap {
    /// (column header, attribute name), in output order
    pub entries: Vec<(String, String)>,
}

impl Default for AttributeMap {
    fn default() -> Self {
        let pairs: &[(&str, &str)] = &[
            ("Stan", "Stan"),
            ("Producent", "Producent"),
            ("Marka", "Marka"),
            ("Model", "Model"),
            ("Kod producenta", "Kod producenta"),
            ("EAN (GTIN)", "EAN"),
            ("Informacje o gwarancjach", "Informacje o gwarancjach"),
            ("Seria procesora", "Seria procesora"),
            ("Model procesora", "Model procesora"),
            ("Liczba rdzeni procesora", "Liczba rdzeni procesora"),
            ("Taktowanie bazowe procesora [GHz]", "Taktowanie bazowe procesora"),
            ("Wielkość pamięci RAM", "Pamięć RAM"),
            ("Typ pamięci RAM", "Typ pamięci RAM"),
            ("Typ dysku twardego", "Typ dysku"),
            ("Pojemność dysku [GB]", "Pojemność dysku"),
            ("Przekątna ekranu [\"]", "Przekątna ekranu [\"]"),
            ("Rozdzielczość (px)", "Rozdzielczość"),
            ("Powłoka matrycy", "Powłoka matrycy"),
            ("Rodzaj karty graficznej", "Rodzaj karty graficznej"),
            ("Model karty graficznej", "Karta graficzna"),
            ("System operacyjny", "System operacyjny"),
            ("Komunikacja", "Komunikacja"),
            ("Złącza", "Złącza"),
            ("Kolor", "Kolor"),
            ("Waga produktu [kg]", "Waga"),
        ];
        Self {
            entries: pairs
                .iter()
                .map(|(c, a)| (c.to_string(), a.to_string()))
                .collect(),
        }
    }
}

/// Keyword-driven attribute classification used for generic CSV exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicAttributes {
    /// Lower-case fragments marking a specification column
    pub keywords: Vec<String>,
    /// Lower-case fragments of columns that are never attributes
    pub denylist: Vec<String>,
}

impl Default for HeuristicAttributes {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            keywords: list(&[
                "procesor", "rdzeni", "taktowanie", "ram", "pamię", "dysk", "ssd", "hdd",
                "ekran", "przekątna", "rozdzielczość", "matryc", "karta graficzna", "grafik",
                "system operacyjny", "stan", "producent", "marka", "model", "gwarancj",
                "kolor", "bateria", "złącza", "komunikacja", "kamera", "klawiatura",
            ]),
            denylist: list(&[
                "id oferty", "link do oferty", "tytuł oferty", "cena", "status oferty",
                "liczba sztuk", "kategoria", "zdjęcia", "opis", "sku", "sygnatura",
                "czas wysyłki", "cennik dostawy", "waga przesyłki", "wymiary paczki",
                "lokalizacja", "faktura", "warunki zwrotów", "warunki reklamacji",
                "ean",
            ]),
        }
    }
}

impl HeuristicAttributes {
    /// True if a keyword starts a word of the normalized header
    pub fn is_attribute(&self, norm: &str) -> bool {
        self.keywords.iter().any(|k| {
            norm.match_indices(k.as_str()).any(|(i, _)| {
                norm[..i]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !c.is_alphanumeric())
            })
        })
    }
}

/// Which columns become `<a>` attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AttributeMode {
    /// Only columns listed in the map
    Mapped(AttributeMap),
    /// Any column that looks like a specification field
    Heuristic(HeuristicAttributes),
}

impl Default for AttributeMode {
    fn default() -> Self {
        AttributeMode::Mapped(AttributeMap::default())
    }
}

/// Quantity requirement for an active offer to count as available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QuantityThreshold {
    /// quantity > n
    Above(Decimal),
    /// quantity >= n
    AtLeast(Decimal),
}

impl QuantityThreshold {
    pub fn admits(&self, quantity: Decimal) -> bool {
        match *self {
            QuantityThreshold::Above(n) => quantity > n,
            QuantityThreshold::AtLeast(n) => quantity >= n,
        }
    }
}

/// Derives availability from status text and quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPolicy {
    /// Status values (lower-case) that mean the offer is live
    pub active_statuses: Vec<String>,
    pub threshold: QuantityThreshold,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            active_statuses: vec!["aktywna".to_string(), "active".to_string()],
            threshold: QuantityThreshold::Above(Decimal::ZERO),
        }
    }
}

impl AvailabilityPolicy {
    /// Default statuses with a `quantity >= min` requirement
    pub fn at_least(min: u32) -> Self {
        Self {
            threshold: QuantityThreshold::AtLeast(Decimal::from(min)),
            ..Self::default()
        }
    }

    pub fn is_available(&self, status: &str, quantity: Decimal) -> bool {
        let status = status.trim().to_lowercase();
        self.active_statuses.iter().any(|s| *s == status) && self.threshold.admits(quantity)
    }
}

/// How the `<cat>` text is assembled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryPolicy {
    /// Top-level category only
    #[default]
    MainOnly,
    /// `main{separator}sub`, or main alone when sub is blank
    MainWithSub { separator: String },
}

/// Description rendering switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionOptions {
    /// Loose mode (`strict = false`) rewrites headings and dash rules
    pub strict: bool,
    /// Keep the raw structured description as `<desc_json>`
    pub include_json: bool,
    /// Write `<desc>` as CDATA
    pub cdata: bool,
}

impl Default for DescriptionOptions {
    fn default() -> Self {
        Self {
            strict: true,
            include_json: true,
            cdata: false,
        }
    }
}

/// Everything the offer builder needs besides the record itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default)]
    pub columns: ColumnNames,
    #[serde(default)]
    pub attributes: AttributeMode,
    #[serde(default)]
    pub availability: AvailabilityPolicy,
    #[serde(default)]
    pub category: CategoryPolicy,
    #[serde(default)]
    pub description: DescriptionOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Tytuł_Oferty "), "tytuł oferty");
        assert_eq!(normalize_header("ID   oferty"), "id oferty");
    }

    #[test]
    fn test_column_names_canonical() {
        let names = ColumnNames::default();
        assert_eq!(names.canonical(Field::Price), "Cena PL");
        assert!(names.names(Field::Sku).iter().any(|n| n == "SKU"));
        assert!(names.is_core_header("liczba_sztuk"));
        assert!(!names.is_core_header("Model procesora"));
    }

    #[test]
    fn test_heuristic_keywords_match_word_starts() {
        let rules = HeuristicAttributes::default();
        assert!(rules.is_attribute("ram"));
        assert!(rules.is_attribute("pamięć ram [gb]"));
        assert!(rules.is_attribute("informacje o gwarancjach"));
        assert!(!rules.is_attribute("parametry"));
        assert!(!rules.is_attribute("gramatura"));
    }

    #[test]
    fn test_threshold_default_is_strictly_positive() {
        let policy = AvailabilityPolicy::default();
        assert!(policy.is_available("Aktywna", Decimal::ONE));
        assert!(policy.is_available(" ACTIVE ", Decimal::new(5, 1)));
        assert!(!policy.is_available("aktywna", Decimal::ZERO));
        assert!(!policy.is_available("zakończona", Decimal::from(50)));
    }

    #[test]
    fn test_threshold_at_least() {
        let policy = AvailabilityPolicy::at_least(10);
        assert!(!policy.is_available("aktywna", Decimal::from(9)));
        assert!(policy.is_available("aktywna", Decimal::from(10)));
    }

    #[test]
    fn test_builder_config_deserializes_with_defaults() {
        let config: BuilderConfig =
            serde_json::from_str(r#"{"category":{"kind":"main_with_sub","separator":" > "}}"#)
                .unwrap();
        assert_eq!(
            config.category,
            CategoryPolicy::MainWithSub {
                separator: " > ".to_string()
            }
        );
        assert!(config.description.strict);
    }
}
