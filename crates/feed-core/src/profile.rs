//! Retailer profiles
//!
//! A profile bundles the builder settings and the post-processing rules for
//! one output feed. Four profiles are built in; any of them can be dumped to
//! JSON, edited and loaded back.

use crate::config::{AvailabilityPolicy, BuilderConfig, DescriptionOptions};
use crate::error::{Error, Result};
use crate::footer::{BudgetTier, FooterTemplate, LinkBlock, SizeBand};
use crate::rules::{Rule, RuleSet, Substitution};
use crate::xml::Feed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Names of the built-in profiles
pub const BUILTIN: [&str; 4] = ["base", "morele", "taniey", "swop"];

const STORE: &str = "Kompre.pl";
const GUARD_PHRASE: &str = "door-to-door";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetailerProfile {
    pub name: String,
    /// Output file name; `{stem}` is replaced by the input file stem
    pub output_file: String,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RetailerProfile {
    /// Look up a built-in profile by name
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "base" => Ok(Self::base()),
            "morele" => Ok(Self::morele()),
            "taniey" => Ok(Self::taniey()),
            "swop" => Ok(Self::swop()),
            other => Err(Error::UnknownProfile(other.to_string())),
        }
    }

    /// Plain feed: every active offer with a positive quantity
    pub fn base() -> Self {
        Self {
            name: "base".to_string(),
            output_file: "{stem}.xml".to_string(),
            builder: BuilderConfig::default(),
            rules: Vec::new(),
        }
    }

    /// Needs at least 5 pieces and takes no structured descriptions
    pub fn morele() -> Self {
        Self {
            name: "morele".to_string(),
            output_file: "{stem}_morele.xml".to_string(),
            builder: BuilderConfig {
                availability: AvailabilityPolicy::at_least(5),
                description: DescriptionOptions {
                    include_json: false,
                    ..DescriptionOptions::default()
                },
                ..BuilderConfig::default()
            },
            rules: Vec::new(),
        }
    }

    /// Post-lease qualifier on categories, warranty in months and a footer
    /// linking to the screen size category
    pub fn taniey() -> Self {
        Self {
            name: "taniey".to_string(),
            output_file: "{stem}_taniey.xml".to_string(),
            builder: BuilderConfig {
                availability: AvailabilityPolicy::at_least(10),
                description: DescriptionOptions {
                    include_json: false,
                    cdata: true,
                    ..DescriptionOptions::default()
                },
                ..BuilderConfig::default()
            },
            rules: vec![
                Rule::CategoryQualifier {
                    qualifier: "poleasingowe".to_string(),
                    labels: qualified_labels("poleasingowe"),
                },
                Rule::DropDescJson,
                warranty_rule(),
                Rule::Footer(FooterTemplate {
                    store: STORE.to_string(),
                    tagline: "autoryzowanego sprzedawcy komputerów poleasingowych klasy biznes."
                        .to_string(),
                    guard_phrase: GUARD_PHRASE.to_string(),
                    category_keyword: "laptop".to_string(),
                    links: screen_size_links(),
                    also_desc_json: false,
                }),
            ],
        }
    }

    /// Refurbished wording throughout and a footer linking to the price
    /// budget category, also mirrored into `<desc_json>`
    pub fn swop() -> Self {
        Self {
            name: "swop".to_string(),
            output_file: "{stem}_swop.xml".to_string(),
            builder: BuilderConfig {
                availability: AvailabilityPolicy::at_least(10),
                description: DescriptionOptions {
                    cdata: true,
                    ..DescriptionOptions::default()
                },
                ..BuilderConfig::default()
            },
            rules: vec![
                Rule::CategoryReplace {
                    pattern: "poleasingowe".to_string(),
                    replacement: "odnowione".to_string(),
                },
                Rule::CategoryQualifier {
                    qualifier: "odnowione".to_string(),
                    labels: qualified_labels("odnowione"),
                },
                Rule::BrandFromProducer {
                    source: "Producent".to_string(),
                    target: "Marka".to_string(),
                },
                Rule::AttributeVocabulary {
                    attribute: "Stan".to_string(),
                    substitutions: refurbished_words(),
                },
                warranty_rule(),
                Rule::DescriptionSubstitution {
                    substitutions: refurbished_words(),
                },
                Rule::Footer(FooterTemplate {
                    store: STORE.to_string(),
                    tagline: "największego i autoryzowanego sprzedawcy biznesowych sprzętów \
                              outletowych, laptopów, komputerów PC i monitorów."
                        .to_string(),
                    guard_phrase: GUARD_PHRASE.to_string(),
                    category_keyword: "laptop".to_string(),
                    links: budget_links(),
                    also_desc_json: true,
                }),
            ],
        }
    }

    /// Load a profile from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let profile: RetailerProfile = serde_json::from_str(&content)?;
        Ok(profile)
    }

    /// Save the profile as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Output path for an input file inside `output_dir`
    pub fn output_path(&self, input: &Path, output_dir: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_dir.join(self.output_file.replace("{stem}", &stem))
    }

    /// Compile and run the profile's rules over a feed
    pub fn apply(&self, feed: &mut Feed) -> Result<usize> {
        let rules = RuleSet::compile(&self.rules)?;
        Ok(rules.apply(feed))
    }
}

fn qualified_labels(qualifier: &str) -> Vec<(String, String)> {
    [
        ("Laptopy", "Laptopy"),
        ("Komputery", "Komputery"),
        ("Monitory komputerowe", "Monitory"),
    ]
    .iter()
    .map(|(base, head)| (base.to_string(), format!("{} {}", head, qualifier)))
    .collect()
}

fn refurbished_words() -> Vec<Substitution> {
    vec![
        Substitution::new("używany", "Odnowiony"),
        Substitution::new("używane", "Odnowione"),
    ]
}

fn warranty_rule() -> Rule {
    Rule::WarrantyMonths {
        source: "Informacje o gwarancjach".to_string(),
        target: "Gwarancja".to_string(),
    }
}

fn screen_size_links() -> LinkBlock {
    // (min, max) in hundredths of an inch
    let bands = [
        (0, 1250, "Laptopy-12-cali/349"),
        (1300, 1340, "Laptopy-13-cali/394"),
        (1400, 1415, "Laptopy-14-cali/350"),
        (1550, 1570, "Laptopy-15-cali/351"),
        (1690, 1735, "Laptopy-17-cali/352"),
    ];
    LinkBlock::ScreenSize {
        attribute_prefix: "przekątna ekranu".to_string(),
        bands: bands
            .iter()
            .map(|&(min, max, path)| SizeBand {
                min: Decimal::new(min, 2),
                max: Decimal::new(max, 2),
                url: format!("https://kompre.pl/pl/c/{}", path),
            })
            .collect(),
        lead: "Posiadamy też inne laptopy w tej klasie rozmiaru – sprawdź:".to_string(),
        closing: "Każdy egzemplarz jest testowany, czyszczony i przygotowany do pracy z \
                  aktualnym systemem. Długa gwarancja door-to-door zapewnia wsparcie i \
                  bezpieczeństwo zakupu."
            .to_string(),
    }
}

fn budget_links() -> LinkBlock {
    let tiers = [
        (500, "Laptopy-do-500-zl/390"),
        (1000, "Laptopy-do-1000-zl/389"),
        (1500, "Laptopy-do-1500-zl/391"),
        (2000, "Laptopy-do-2000-zl/392"),
        (3000, "Laptopy-do-3000-zl/399"),
        (5000, "Laptopy-do-5000-zl/500"),
    ];
    LinkBlock::Budget {
        tiers: tiers
            .iter()
            .map(|&(max, path)| BudgetTier {
                max_price: Decimal::from(max),
                url: format!("https://kompre.pl/pl/c/{}", path),
            })
            .collect(),
        lead: "Sprawdź też inne niezawodne laptopy w Twoim budżecie:".to_string(),
        closing: "Każdy komputer jest dokładnie sprawdzany, czyszczony i konfigurowany, aby \
                  zapewnić niezawodność w codziennym użytkowaniu. Kupując sprzęt, zyskujesz \
                  jakość klasy biznes oraz pewność gwarancji door-to-door."
            .to_string(),
    }
}
