//! Description transcoding: structured rich text to HTML, plus sanitising
//!
//! Offer descriptions arrive either as HTML/plain text or as a JSON document
//! of `sections`, each holding `items` of type `TEXT` (trusted HTML) or
//! `IMAGE` (a URL). Both paths end in the same minimal sanitiser, which only
//! removes `<script>` and `<iframe>` blocks.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid script regex")
});

static IFRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<iframe\b[^>]*>.*?</iframe\s*>").expect("valid iframe regex")
});

static DASH_H1_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h1\b[^>]*>\s*(?:[-_]\s*){3,}</h1\s*>").expect("valid h1 rule regex")
});

static MINOR_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)h[3-6]\b").expect("valid heading regex"));

/// A description ready for `<desc>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    /// Sanitised HTML
    pub html: String,
    /// True when the input was a structured (JSON) description
    pub structured: bool,
}

/// Convert a raw description cell into sanitised HTML.
///
/// Never fails: JSON that does not parse, or parses without a section list,
/// is treated as HTML text. `strict = false` enables the loose cosmetic
/// rewrites (see [`loosen`]).
pub fn transcode(raw: &str, strict: bool) -> Transcoded {
    let trimmed = raw.trim();
    let rendered = if looks_like_json(trimmed) {
        serde_json::from_str::<Value>(trimmed)
            .ok()
            .and_then(|doc| render_sections(&doc))
    } else {
        None
    };

    let structured = rendered.is_some();
    let mut html = sanitize(rendered.as_deref().unwrap_or(trimmed));
    if !strict {
        html = loosen(&html);
    }
    Transcoded { html, structured }
}

/// True if the text starts like a JSON object or array
pub fn looks_like_json(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('{') || text.starts_with('[')
}

/// Section list of a structured description: `{"sections": [...]}` or a
/// bare array of sections
pub fn sections(doc: &Value) -> Option<&Vec<Value>> {
    match doc {
        Value::Object(map) => map.get("sections").and_then(Value::as_array),
        Value::Array(list) => Some(list),
        _ => None,
    }
}

fn render_sections(doc: &Value) -> Option<String> {
    let sections = sections(doc)?;
    let rendered: Vec<String> = sections
        .iter()
        .filter_map(|section| {
            let items = section.get("items")?.as_array()?;
            let parts: Vec<String> = items.iter().filter_map(render_item).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        })
        .collect();
    Some(rendered.join("\n\n"))
}

fn render_item(item: &Value) -> Option<String> {
    let kind = item.get("type")?.as_str()?.to_ascii_uppercase();
    match kind.as_str() {
        "TEXT" => item
            .get("content")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string),
        "IMAGE" => {
            let url = item.get("url").and_then(Value::as_str)?.trim();
            if url.is_empty() {
                return None;
            }
            Some(format!(
                r#"<p><img src="{}" loading="lazy" alt=""></p>"#,
                quick_xml::escape::escape(url)
            ))
        }
        _ => None,
    }
}

/// Remove `<script>` and `<iframe>` blocks, leaving all other markup alone
pub fn sanitize(html: &str) -> String {
    let html = SCRIPT_RE.replace_all(html, "");
    IFRAME_RE.replace_all(&html, "").into_owned()
}

/// Loose-mode rewrites: `<h1>` elements made only of dashes/underscores
/// become `<hr>`, and `<h3>`..`<h6>` become `<h2>`.
pub fn loosen(html: &str) -> String {
    let html = DASH_H1_RE.replace_all(html, "<hr>");
    MINOR_HEADING_RE.replace_all(&html, "<${1}h2").into_owned()
}
