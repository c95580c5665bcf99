//! Store footer appended to offer descriptions
//!
//! The footer starts with a sentinel comment so a second run recognises it
//! and leaves the description alone.

use crate::offer::parse_decimal;
use crate::xml::{Description, OfferElement};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Sentinel placed at the start of every injected footer
pub const FOOTER_MARK: &str = "<!---->";

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").expect("valid number regex"));

/// A screen size band and the category page it links to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeBand {
    pub min: Decimal,
    pub max: Decimal,
    pub url: String,
}

/// A price ceiling and the category page it links to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetTier {
    pub max_price: Decimal,
    pub url: String,
}

/// Optional paragraph linking to related category pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkBlock {
    None,
    /// Pick a link by the screen diagonal attribute
    ScreenSize {
        /// Lower-case prefix of the diagonal attribute name
        attribute_prefix: String,
        bands: Vec<SizeBand>,
        lead: String,
        closing: String,
    },
    /// Pick a link by offer price; above every tier the last URL is used
    Budget {
        tiers: Vec<BudgetTier>,
        lead: String,
        closing: String,
    },
}

impl LinkBlock {
    fn render(&self, offer: &OfferElement) -> Option<String> {
        let (url, lead, closing) = match self {
            LinkBlock::None => return None,
            LinkBlock::ScreenSize {
                attribute_prefix,
                bands,
                lead,
                closing,
            } => {
                let size = screen_size(offer, attribute_prefix)?;
                let band = bands.iter().find(|b| b.min <= size && size <= b.max)?;
                (band.url.as_str(), lead, closing)
            }
            LinkBlock::Budget {
                tiers,
                lead,
                closing,
            } => {
                let price = parse_decimal(&offer.price)?;
                let tier = tiers
                    .iter()
                    .find(|t| price <= t.max_price)
                    .or_else(|| tiers.last())?;
                (tier.url.as_str(), lead, closing)
            }
        };
        Some(format!("<p>{} {}. {}</p>", lead, url, closing))
    }
}

/// First number in the attribute whose name starts with `prefix`
fn screen_size(offer: &OfferElement, prefix: &str) -> Option<Decimal> {
    let (_, value) = offer
        .attributes
        .iter()
        .find(|(name, _)| name.trim().to_lowercase().starts_with(prefix))?;
    let number = NUMBER_RE.captures(value)?.get(1)?.as_str();
    parse_decimal(number)
}

/// Footer text and placement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterTemplate {
    /// Store name, also used to recognise older footers
    pub store: String,
    /// Text after the store name in the first paragraph
    pub tagline: String,
    /// Second phrase that, together with the store name, marks a footer
    pub guard_phrase: String,
    /// Link paragraph only for categories containing this (lower-case)
    pub category_keyword: String,
    pub links: LinkBlock,
    /// Also append the footer as a TEXT section of `<desc_json>`
    pub also_desc_json: bool,
}

impl FooterTemplate {
    /// Footer HTML for an offer
    pub fn render(&self, offer: &OfferElement) -> String {
        let links = if offer
            .category
            .to_lowercase()
            .contains(&self.category_keyword)
        {
            self.links.render(offer).unwrap_or_default()
        } else {
            String::new()
        };
        format!(
            "{}<hr/><p><strong>{}</strong> pochodzi z oferty <strong>{}</strong> – {}</p> {}",
            FOOTER_MARK,
            quick_xml::escape::escape(offer.name.trim()),
            self.store,
            self.tagline,
            links
        )
    }

    /// True if the HTML already carries a footer
    pub fn is_present(&self, html: &str) -> bool {
        html.contains(FOOTER_MARK)
            || (html.contains(&self.store) && html.contains(&self.guard_phrase))
    }

    /// Append the footer to `<desc>` (and `<desc_json>` if enabled).
    ///
    /// Offers without a description are left alone; the description is
    /// switched to CDATA either way.
    pub fn append(&self, offer: &mut OfferElement) {
        let footer = self.render(offer);

        if let Some(desc) = offer.desc.as_mut() {
            if !self.is_present(&desc.html) {
                let joiner = if !desc.html.is_empty() && !desc.html.ends_with('\n') {
                    "\n"
                } else {
                    ""
                };
                let html = format!("{}{}{}", desc.html, joiner, footer);
                *desc = Description {
                    html: html.trim().to_string(),
                    cdata: true,
                };
            } else {
                desc.cdata = true;
            }
        }

        if self.also_desc_json {
            if let Some(json) = offer.desc_json.as_mut() {
                if let Some(updated) = append_json_section(json, &footer) {
                    *json = updated;
                }
            }
        }
    }
}

/// Add a TEXT section holding `html` to a structured description.
///
/// Returns `None` when the JSON is blank, unparsable, already has a footer
/// or is not an object/array.
fn append_json_section(raw: &str, html: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains(FOOTER_MARK) {
        return None;
    }
    let mut doc: Value = serde_json::from_str(raw).ok()?;
    let section = json!({ "items": [{ "type": "TEXT", "content": html }] });

    match &mut doc {
        Value::Object(map) => match map.get_mut("sections") {
            Some(Value::Array(sections)) => sections.push(section),
            _ => {
                map.insert("sections".to_string(), Value::Array(vec![section]));
            }
        },
        Value::Array(sections) => sections.push(section),
        _ => return None,
    }
    serde_json::to_string(&doc).ok()
}
