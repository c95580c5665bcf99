//! Post-processing rules applied to a built feed
//!
//! A [`Rule`] is the serialisable description kept in a retailer profile.
//! [`Rule::compile`] turns it into a [`PostProcessor`] that mutates one
//! `<o>` element at a time. Every processor checks the state it would
//! produce before acting, so running a rule set twice leaves the feed as
//! it was after the first run.

use crate::error::Result;
use crate::footer::{FooterTemplate, FOOTER_MARK};
use crate::offer::parse_decimal;
use crate::xml::{Feed, OfferElement};
use regex::{NoExpand, Regex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid digits regex"));

/// A whole-word substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub word: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(word: &str, replacement: &str) -> Self {
        Self {
            word: word.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// One feed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Demote available offers whose `stock` count is below `min_stock`
    StockThreshold { min_stock: u32 },
    /// Case-insensitive literal replacement inside `<cat>`
    CategoryReplace { pattern: String, replacement: String },
    /// Relabel known base categories unless `qualifier` is already present
    CategoryQualifier {
        qualifier: String,
        /// (base label, qualified label), base compared case-insensitively
        labels: Vec<(String, String)>,
    },
    /// Copy the `source` attribute to `target` when `target` is absent
    BrandFromProducer { source: String, target: String },
    /// Replace the whole value of `attribute` with the first matching word's replacement
    AttributeVocabulary {
        attribute: String,
        substitutions: Vec<Substitution>,
    },
    /// Rename `source` to `target` keeping only the first run of digits;
    /// an existing `target` is overwritten
    WarrantyMonths { source: String, target: String },
    /// Whole-word replacements in the `<desc>` HTML before the store footer
    DescriptionSubstitution { substitutions: Vec<Substitution> },
    /// Append the store footer
    Footer(FooterTemplate),
    /// Remove `<desc_json>`
    DropDescJson,
}

impl Rule {
    /// Compile into a processor, building any regexes the rule needs
    pub fn compile(&self) -> Result<Box<dyn PostProcessor>> {
        let processor: Box<dyn PostProcessor> = match self {
            Rule::StockThreshold { min_stock } => Box::new(StockThreshold {
                min_stock: Decimal::from(*min_stock),
            }),
            Rule::CategoryReplace {
                pattern,
                replacement,
            } => Box::new(CategoryReplace {
                pattern: Regex::new(&format!("(?i){}", regex::escape(pattern)))?,
                replacement: replacement.clone(),
            }),
            Rule::CategoryQualifier { qualifier, labels } => Box::new(CategoryQualifier {
                qualifier: qualifier.to_lowercase(),
                labels: labels
                    .iter()
                    .map(|(from, to)| (from.trim().to_lowercase(), to.clone()))
                    .collect(),
            }),
            Rule::BrandFromProducer { source, target } => Box::new(BrandFromProducer {
                source: source.clone(),
                target: target.clone(),
            }),
            Rule::AttributeVocabulary {
                attribute,
                substitutions,
            } => Box::new(AttributeVocabulary {
                attribute: attribute.trim().to_lowercase(),
                words: compile_words(substitutions)?,
            }),
            Rule::WarrantyMonths { source, target } => Box::new(WarrantyMonths {
                source: source.trim().to_lowercase(),
                target: target.clone(),
            }),
            Rule::DescriptionSubstitution { substitutions } => {
                Box::new(DescriptionSubstitution {
                    words: compile_words(substitutions)?,
                })
            }
            Rule::Footer(template) => Box::new(template.clone()),
            Rule::DropDescJson => Box::new(DropDescJson),
        };
        Ok(processor)
    }
}

fn compile_words(substitutions: &[Substitution]) -> Result<Vec<(Regex, String)>> {
    substitutions
        .iter()
        .map(|s| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&s.word)))?;
            Ok((re, s.replacement.clone()))
        })
        .collect()
}

/// A compiled rule
pub trait PostProcessor {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Mutate the offer; returns whether anything changed
    fn apply(&self, offer: &mut OfferElement) -> bool;
}

/// Compiled rules in profile order
pub struct RuleSet {
    processors: Vec<Box<dyn PostProcessor>>,
}

impl RuleSet {
    pub fn compile(rules: &[Rule]) -> Result<Self> {
        let processors = rules.iter().map(Rule::compile).collect::<Result<Vec<_>>>()?;
        Ok(Self { processors })
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Apply every rule to every offer; returns the number of offers changed
    pub fn apply(&self, feed: &mut Feed) -> usize {
        let mut changed = 0;
        for offer in &mut feed.offers {
            let mut touched = false;
            for processor in &self.processors {
                if processor.apply(offer) {
                    debug!(offer = %offer.id, rule = processor.name(), "rule applied");
                    touched = true;
                }
            }
            if touched {
                changed += 1;
            }
        }
        changed
    }
}

struct StockThreshold {
    min_stock: Decimal,
}

impl PostProcessor for StockThreshold {
    fn name(&self) -> &'static str {
        "stock_threshold"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        if offer.avail.trim() != "1" {
            return false;
        }
        let stock = parse_decimal(&offer.stock).unwrap_or(Decimal::ZERO);
        if stock >= self.min_stock {
            return false;
        }
        offer.avail = "99".to_string();
        offer.stock = "0".to_string();
        offer.basket = "0".to_string();
        true
    }
}

struct CategoryReplace {
    pattern: Regex,
    replacement: String,
}

impl PostProcessor for CategoryReplace {
    fn name(&self) -> &'static str {
        "category_replace"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        if !self.pattern.is_match(&offer.category) {
            return false;
        }
        let replaced = self
            .pattern
            .replace_all(offer.category.trim(), NoExpand(&self.replacement))
            .into_owned();
        let changed = replaced != offer.category;
        offer.category = replaced;
        changed
    }
}

struct CategoryQualifier {
    qualifier: String,
    labels: Vec<(String, String)>,
}

impl PostProcessor for CategoryQualifier {
    fn name(&self) -> &'static str {
        "category_qualifier"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        let norm = offer.category.trim().to_lowercase();
        if norm.contains(&self.qualifier) {
            return false;
        }
        match self.labels.iter().find(|(from, _)| *from == norm) {
            Some((_, to)) => {
                offer.category = to.clone();
                true
            }
            None => false,
        }
    }
}

struct BrandFromProducer {
    source: String,
    target: String,
}

impl PostProcessor for BrandFromProducer {
    fn name(&self) -> &'static str {
        "brand_from_producer"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        if offer.has_attribute(&self.target) {
            return false;
        }
        let producer = match offer.attribute(&self.source) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => return false,
        };
        offer.attributes.push((self.target.clone(), producer));
        true
    }
}

struct AttributeVocabulary {
    attribute: String,
    words: Vec<(Regex, String)>,
}

impl PostProcessor for AttributeVocabulary {
    fn name(&self) -> &'static str {
        "attribute_vocabulary"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        let mut changed = false;
        for (name, value) in offer.attributes.iter_mut() {
            if name.trim().to_lowercase() != self.attribute {
                continue;
            }
            let current = value.trim();
            if let Some((_, replacement)) = self.words.iter().find(|(re, _)| re.is_match(current)) {
                if *value != *replacement {
                    *value = replacement.clone();
                    changed = true;
                }
            }
        }
        changed
    }
}

struct WarrantyMonths {
    source: String,
    target: String,
}

impl PostProcessor for WarrantyMonths {
    fn name(&self) -> &'static str {
        "warranty_months"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        let Some(pos) = offer
            .attributes
            .iter()
            .position(|(name, _)| name.trim().to_lowercase() == self.source)
        else {
            return false;
        };
        let (_, value) = offer.attributes.remove(pos);
        let months = DIGITS_RE
            .find(&value)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        // Attribute names stay unique: an existing target takes the value.
        offer
            .attributes
            .retain(|(name, _)| name.trim().to_lowercase() != self.source);
        match offer.attributes.iter_mut().find(|(name, _)| *name == self.target) {
            Some((_, existing)) => *existing = months,
            None => offer.attributes.insert(pos, (self.target.clone(), months)),
        }
        true
    }
}

struct DescriptionSubstitution {
    words: Vec<(Regex, String)>,
}

impl PostProcessor for DescriptionSubstitution {
    fn name(&self) -> &'static str {
        "description_substitution"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        let Some(desc) = offer.desc.as_mut() else {
            return false;
        };
        // The store footer is left as rendered.
        let split = desc.html.find(FOOTER_MARK).unwrap_or(desc.html.len());
        let (body, footer) = desc.html.split_at(split);
        let mut text = body.to_string();
        for (re, replacement) in &self.words {
            text = re.replace_all(&text, NoExpand(replacement)).into_owned();
        }
        if text == body {
            return false;
        }
        desc.html = format!("{}{}", text, footer);
        true
    }
}

impl PostProcessor for FooterTemplate {
    fn name(&self) -> &'static str {
        "footer"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        let before = (offer.desc.clone(), offer.desc_json.clone());
        self.append(offer);
        before != (offer.desc.clone(), offer.desc_json.clone())
    }
}

struct DropDescJson;

impl PostProcessor for DropDescJson {
    fn name(&self) -> &'static str {
        "drop_desc_json"
    }

    fn apply(&self, offer: &mut OfferElement) -> bool {
        offer.desc_json.take().is_some()
    }
}
