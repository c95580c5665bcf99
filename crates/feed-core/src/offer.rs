//! Canonical offer record

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Availability code written to the `avail` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn code(self) -> u8 {
        match self {
            Availability::Available => 1,
            Availability::Unavailable => 99,
        }
    }

    /// 1 when available, else 0 (used for `stock` and `basket`)
    pub fn flag(self) -> u8 {
        match self {
            Availability::Available => 1,
            Availability::Unavailable => 0,
        }
    }
}

/// One product listing destined for the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub url: String,
    pub price: Option<Decimal>,
    pub availability: Availability,
    pub category: String,
    pub name: String,
    /// Sanitised HTML description
    pub description: Option<String>,
    /// Raw structured description, kept verbatim
    pub description_json: Option<String>,
    /// Image URLs; the first one is the main image
    pub images: Vec<String>,
    /// Attribute name/value pairs, names unique
    pub attributes: Vec<(String, String)>,
}

impl Offer {
    pub fn stock(&self) -> u8 {
        self.availability.flag()
    }

    pub fn basket(&self) -> u8 {
        self.availability.flag()
    }

    pub fn main_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Price as written to the feed; empty when unknown
    pub fn price_text(&self) -> String {
        self.price.map(|p| p.to_string()).unwrap_or_default()
    }
}

/// Parse a locale-formatted number such as `1 299,00 zł` or `1,299.00`.
///
/// Spaces (including non-breaking ones) and anything that is not a digit,
/// sign or separator are dropped. When both `,` and `.` appear the later one
/// is the decimal separator. Returns `None` for anything unparsable.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let kept = kept.trim_end_matches(['.', ',']);
    if kept.is_empty() {
        return None;
    }

    let normalized = match (kept.rfind(','), kept.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => kept.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => kept.replace(',', ""),
        (Some(_), None) => kept.replace(',', "."),
        _ => kept.to_string(),
    };
    Decimal::from_str(&normalized).ok()
}
