//! Offer builder: one [`RawRecord`] in, zero or one [`Offer`] out

use crate::config::{normalize_header, AttributeMode, BuilderConfig, CategoryPolicy, Field};
use crate::description::transcode;
use crate::offer::{parse_decimal, Availability, Offer};
use crate::schema::ColumnIndex;
use crate::table::RawRecord;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::LazyLock;

static URL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\D*$").expect("valid url id regex"));

static IMAGE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/?#]+\S*$").expect("valid image url regex"));

static UNIT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\[[^\]]+\]|\([^)]+\))\s*$").expect("valid unit suffix regex"));

/// Maps records of one table onto offers.
///
/// Attribute columns are resolved once per table, so the builder is tied to
/// the header row it was created with.
pub struct OfferBuilder<'a> {
    config: &'a BuilderConfig,
    columns: &'a ColumnIndex,
    /// (column position, attribute name)
    attribute_columns: Vec<(usize, String)>,
}

impl<'a> OfferBuilder<'a> {
    pub fn new<S: AsRef<str>>(
        config: &'a BuilderConfig,
        columns: &'a ColumnIndex,
        headers: &[S],
    ) -> Self {
        let attribute_columns = match &config.attributes {
            AttributeMode::Mapped(map) => {
                let normalized: Vec<String> =
                    headers.iter().map(|h| normalize_header(h.as_ref())).collect();
                map.entries
                    .iter()
                    .filter_map(|(column, attribute)| {
                        let column = normalize_header(column);
                        normalized
                            .iter()
                            .position(|h| *h == column)
                            .map(|pos| (pos, attribute.clone()))
                    })
                    .collect()
            }
            AttributeMode::Heuristic(rules) => headers
                .iter()
                .enumerate()
                .filter(|(_, h)| {
                    let header: &str = h.as_ref();
                    let norm = normalize_header(header);
                    if norm.is_empty()
                        || config.columns.is_core_header(header)
                        || rules.denylist.iter().any(|d| norm.contains(d.as_str()))
                    {
                        return false;
                    }
                    rules.is_attribute(&norm)
                        || UNIT_SUFFIX_RE.is_match(header.trim())
                })
                .map(|(pos, h)| {
                    let header: &str = h.as_ref();
                    (pos, header.trim().to_string())
                })
                .collect(),
        };

        Self {
            config,
            columns,
            attribute_columns,
        }
    }

    /// Attribute names this builder will look for, in output order
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attribute_columns
            .iter()
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Build an offer, or `None` when the record has no id or no title
    pub fn build(&self, record: &RawRecord) -> Option<Offer> {
        let name = self.value(record, Field::Title).to_string();
        let url = self.value(record, Field::Url).to_string();
        let id = self.resolve_id(record, &url)?;
        if name.is_empty() {
            return None;
        }

        let quantity = parse_decimal(self.value(record, Field::Quantity)).unwrap_or(Decimal::ZERO);
        let availability = if self
            .config
            .availability
            .is_available(self.value(record, Field::Status), quantity)
        {
            Availability::Available
        } else {
            Availability::Unavailable
        };

        let raw_description = self.value(record, Field::Description);
        let (description, description_json) = if raw_description.is_empty() {
            (None, None)
        } else {
            let options = &self.config.description;
            let transcoded = transcode(raw_description, options.strict);
            let json = (options.include_json && transcoded.structured)
                .then(|| raw_description.to_string());
            let html = (!transcoded.html.is_empty()).then_some(transcoded.html);
            (html, json)
        };

        Some(Offer {
            id,
            url,
            price: parse_decimal(self.value(record, Field::Price)),
            availability,
            category: self.category(record),
            name,
            description,
            description_json,
            images: split_images(self.value(record, Field::Images)),
            attributes: self.attributes(record),
        })
    }

    fn value<'r>(&self, record: &'r RawRecord, field: Field) -> &'r str {
        self.columns
            .get(field)
            .and_then(|pos| record.at(pos))
            .unwrap_or("")
    }

    /// Id column, then trailing digits of the offer URL, then SKU
    fn resolve_id(&self, record: &RawRecord, url: &str) -> Option<String> {
        let explicit = self.value(record, Field::Id);
        if !explicit.is_empty() {
            return Some(explicit.to_string());
        }
        if let Some(id) = id_from_url(url) {
            return Some(id);
        }
        let sku = self.value(record, Field::Sku);
        (!sku.is_empty()).then(|| sku.to_string())
    }

    fn category(&self, record: &RawRecord) -> String {
        let main = self.value(record, Field::Category);
        match &self.config.category {
            CategoryPolicy::MainOnly => main.to_string(),
            CategoryPolicy::MainWithSub { separator } => {
                let sub = self.value(record, Field::SubCategory);
                match (main.is_empty(), sub.is_empty()) {
                    (_, true) => main.to_string(),
                    (true, false) => sub.to_string(),
                    (false, false) => format!("{}{}{}", main, separator, sub),
                }
            }
        }
    }

    fn attributes(&self, record: &RawRecord) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for (pos, name) in &self.attribute_columns {
            let value = record.at(*pos).unwrap_or("");
            if value.is_empty() || out.iter().any(|(n, _)| n == name) {
                continue;
            }
            out.push((name.clone(), value.to_string()));
        }
        out
    }
}

/// Last run of digits in a URL, ignoring a non-digit tail
pub fn id_from_url(url: &str) -> Option<String> {
    URL_ID_RE
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Split a `|`-separated image list, keeping only http(s) URLs
pub fn split_images(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|u| IMAGE_URL_RE.is_match(u))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AvailabilityPolicy, HeuristicAttributes};

    const HEADERS: &[&str] = &[
        "ID oferty",
        "Tytuł oferty",
        "Cena PL",
        "Link do oferty",
        "Status oferty",
        "Liczba sztuk",
        "Kategoria główna",
        "Podkategoria",
        "Sygnatura/SKU Sprzedającego",
        "Zdjęcia",
        "Opis oferty",
        "Stan",
        "Producent",
        "Wielkość pamięci RAM",
        "Czas wysyłki",
        "Pojemność baterii (mAh)",
    ];

    fn record(values: &[&str]) -> RawRecord {
        RawRecord::new(
            HEADERS
                .iter()
                .enumerate()
                .map(|(i, h)| (h.to_string(), values.get(i).unwrap_or(&"").to_string()))
                .collect(),
        )
    }

    fn full_row() -> RawRecord {
        record(&[
            "123",
            "Laptop Dell Latitude",
            "1 299,00",
            "https://allegro.pl/oferta/laptop-dell-123",
            "Aktywna",
            "3",
            "Laptopy",
            "Dell",
            "SKU-1",
            "http://a/1.jpg|http://a/2.jpg|notaurl",
            "<p>Opis</p>",
            "Używany",
            "Dell",
            "16 GB",
            "24h",
            "4000",
        ])
    }

    fn build_with(config: &BuilderConfig, rec: &RawRecord) -> Option<Offer> {
        let columns = ColumnIndex::resolve(HEADERS, &config.columns);
        OfferBuilder::new(config, &columns, HEADERS).build(rec)
    }

    #[test]
    fn test_build_full_record() {
        let offer = build_with(&BuilderConfig::default(), &full_row()).unwrap();

        assert_eq!(offer.id, "123");
        assert_eq!(offer.name, "Laptop Dell Latitude");
        assert_eq!(offer.price_text(), "1299.00");
        assert_eq!(offer.availability, Availability::Available);
        assert_eq!(offer.category, "Laptopy");
        assert_eq!(offer.description.as_deref(), Some("<p>Opis</p>"));
        assert_eq!(offer.description_json, None);
        assert_eq!(
            offer.attributes,
            vec![
                ("Stan".to_string(), "Używany".to_string()),
                ("Producent".to_string(), "Dell".to_string()),
                ("Pamięć RAM".to_string(), "16 GB".to_string()),
            ]
        );
    }

    #[test]
    fn test_images_keep_only_urls() {
        let offer = build_with(&BuilderConfig::default(), &full_row()).unwrap();
        assert_eq!(offer.images, vec!["http://a/1.jpg", "http://a/2.jpg"]);
        assert_eq!(offer.main_image(), Some("http://a/1.jpg"));
        assert!(split_images("ftp://x/a.jpg| |https://").is_empty());
    }

    #[test]
    fn test_missing_id_or_title_yields_nothing() {
        let config = BuilderConfig::default();
        let no_title = record(&["1", "", "10"]);
        assert!(build_with(&config, &no_title).is_none());

        let no_id = record(&["", "Tytuł", "10", "", "", "", "", "", ""]);
        assert!(build_with(&config, &no_id).is_none());
    }

    #[test]
    fn test_id_fallback_chain() {
        let config = BuilderConfig::default();
        let from_url = record(&["", "T", "", "https://allegro.pl/oferta/x-987654?utm=a"]);
        assert_eq!(build_with(&config, &from_url).unwrap().id, "987654");

        let from_sku = record(&["", "T", "", "https://allegro.pl/oferta/x", "", "", "", "", "SKU-9"]);
        assert_eq!(build_with(&config, &from_sku).unwrap().id, "SKU-9");
    }

    #[test]
    fn test_id_from_url() {
        assert_eq!(id_from_url("https://x/oferta/abc-12-345"), Some("345".to_string()));
        assert_eq!(id_from_url("https://x/345/"), Some("345".to_string()));
        assert_eq!(id_from_url("https://x/abc"), None);
    }

    #[test]
    fn test_availability_rules() {
        let config = BuilderConfig::default();
        let cases = [
            ("aktywna", "1", Availability::Available),
            ("AKTYWNA", "0,5", Availability::Available),
            ("aktywna", "0", Availability::Unavailable),
            ("aktywna", "abc", Availability::Unavailable),
            ("zakończona", "10", Availability::Unavailable),
        ];
        for (status, qty, expected) in cases {
            let rec = record(&["1", "T", "", "", status, qty]);
            let offer = build_with(&config, &rec).unwrap();
            assert_eq!(offer.availability, expected, "status={status} qty={qty}");
        }
    }

    #[test]
    fn test_availability_threshold_is_pluggable() {
        let config = BuilderConfig {
            availability: AvailabilityPolicy::at_least(5),
            ..BuilderConfig::default()
        };
        let four = record(&["1", "T", "", "", "aktywna", "4"]);
        let five = record(&["1", "T", "", "", "aktywna", "5"]);
        assert_eq!(build_with(&config, &four).unwrap().availability, Availability::Unavailable);
        assert_eq!(build_with(&config, &five).unwrap().availability, Availability::Available);
    }

    #[test]
    fn test_category_policies() {
        let main_only = build_with(&BuilderConfig::default(), &full_row()).unwrap();
        assert_eq!(main_only.category, "Laptopy");

        let config = BuilderConfig {
            category: CategoryPolicy::MainWithSub {
                separator: " > ".to_string(),
            },
            ..BuilderConfig::default()
        };
        assert_eq!(build_with(&config, &full_row()).unwrap().category, "Laptopy > Dell");

        let no_sub = record(&["1", "T", "", "", "", "", "Monitory"]);
        assert_eq!(build_with(&config, &no_sub).unwrap().category, "Monitory");
    }

    #[test]
    fn test_structured_description_kept_as_json() {
        let raw = r#"{"sections":[{"items":[{"type":"TEXT","content":"<p>hi</p>"}]}]}"#;
        let mut values: Vec<&str> = vec![""; HEADERS.len()];
        values[0] = "1";
        values[1] = "T";
        values[10] = raw;
        let offer = build_with(&BuilderConfig::default(), &record(&values)).unwrap();

        assert_eq!(offer.description.as_deref(), Some("<p>hi</p>"));
        assert_eq!(offer.description_json.as_deref(), Some(raw));
    }

    #[test]
    fn test_heuristic_attributes() {
        let config = BuilderConfig {
            attributes: AttributeMode::Heuristic(HeuristicAttributes::default()),
            ..BuilderConfig::default()
        };
        let columns = ColumnIndex::resolve(HEADERS, &config.columns);
        let builder = OfferBuilder::new(&config, &columns, HEADERS);

        assert_eq!(
            builder.attribute_names(),
            vec!["Stan", "Producent", "Wielkość pamięci RAM", "Pojemność baterii (mAh)"]
        );
    }

    #[test]
    fn test_heuristic_skips_words_containing_keywords() {
        let headers = ["ID oferty", "Parametry", "Gramatura", "RAM"];
        let config = BuilderConfig {
            attributes: AttributeMode::Heuristic(HeuristicAttributes::default()),
            ..BuilderConfig::default()
        };
        let columns = ColumnIndex::resolve(&headers, &config.columns);
        let builder = OfferBuilder::new(&config, &columns, &headers);

        assert_eq!(builder.attribute_names(), vec!["RAM"]);
    }
}
