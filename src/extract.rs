//! Selector-cascade helpers shared by the per-site parsers.
//!
//! Each field is resolved by trying an ordered list of CSS selectors and
//! taking the first non-empty match, with a regex scan over the card's full
//! text as the last resort. Missing data comes back as `None`; the caller
//! fills sentinels in one place.

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

/// Minimum length for a card title to count as real text rather than an
/// icon label or stray glyph.
pub const LISTING_CARD_MIN_TITLE: usize = 6;

/// First non-empty trimmed text among `selectors`, at least `min_len` chars.
///
/// Selectors that fail to parse are skipped; the cascades carry legacy
/// entries that are only valid against older site markup.
pub fn first_text(el: &ElementRef, selectors: &[&str], min_len: usize) -> Option<String> {
    first_text_where(el, selectors, |t| t.len() >= min_len)
}

/// Like [`first_text`] but with an arbitrary acceptance predicate.
pub fn first_text_where<F>(el: &ElementRef, selectors: &[&str], accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        if let Some(found) = el.select(&sel).next() {
            let text = collapse_ws(&found.text().collect::<String>());
            if !text.is_empty() && accept(&text) {
                return Some(text);
            }
        }
    }
    None
}

/// First non-empty value of `attr` among `selectors`.
pub fn first_attr(el: &ElementRef, selectors: &[&str], attr: &str) -> Option<String> {
    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        for found in el.select(&sel) {
            if let Some(value) = found.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// All trimmed texts under a single selector; empty when it fails to parse.
pub fn all_texts(el: &ElementRef, selector: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    el.select(&sel)
        .map(|e| collapse_ws(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Regex fallback: first pattern that matches wins. Returns capture group 1
/// when present, the whole match otherwise.
pub fn regex_first(text: &str, patterns: &[&str]) -> Option<String> {
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(text) {
            let m = caps.get(1).or_else(|| caps.get(0))?;
            let found = m.as_str().trim();
            if !found.is_empty() {
                return Some(found.to_string());
            }
        }
    }
    None
}

/// Shallow price validation: a digit or a currency token is enough.
pub fn looks_like_price(text: &str) -> bool {
    text.contains('$')
        || text.contains("MXN")
        || text.contains("USD")
        || text.chars().any(|c| c.is_ascii_digit())
}

/// Counts like "3" or "2.5"; spaces tolerated.
pub fn numeric_like(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Resolve a card href against the site's base URL. Anchors, javascript and
/// mailto links are rejected.
pub fn normalize_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Card boundary cascade: the first selector that matches anything wins,
/// later entries are never mixed in.
pub fn select_cards<'a>(doc: &'a scraper::Html, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        let cards: Vec<ElementRef<'a>> = doc.select(&sel).collect();
        if !cards.is_empty() {
            tracing::debug!("Found {} cards with selector {raw}", cards.len());
            return cards;
        }
    }
    tracing::debug!("No cards matched any selector");
    Vec::new()
}

/// Fill the sentinel for a field no resolver matched.
pub fn or_sentinel(value: Option<String>, sentinel: &str) -> String {
    value.unwrap_or_else(|| sentinel.to_string())
}

pub fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap a field at `max` characters; several portals pad descriptions with
/// the full ad body.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Regex patterns shared by several sites when selectors come up empty.
pub mod patterns {
    pub const BEDROOMS: &[&str] = &[
        r"(?i)(\d+)\s*(?:rec[áa]mara|habitacion|bedroom|hab\b|rec\b|cuarto)",
        r"(?i)(\d+)\s*(?:room|bedroom)",
        r"(?i)rec[áa]maras?\s*(\d+)",
        r"(?i)habitaciones?\s*(\d+)",
    ];

    pub const BATHROOMS: &[&str] = &[
        r"(?i)(\d+(?:\.\d+)?)\s*(?:baño|bathroom|bath)",
        r"(?i)baños?\s*(\d+(?:\.\d+)?)",
        r"(?i)bathrooms?\s*(\d+(?:\.\d+)?)",
    ];

    pub const AREA: &[&str] = &[
        r"(\d+(?:,\d+)?)\s*(?:m²|metros|sqm|mt2)",
        r"(\d+)\s*(?:metro|sq)",
        r"(?i)superficie[:\s]*(\d+(?:,\d+)?)",
        r"(?i)área[:\s]*(\d+(?:,\d+)?)",
    ];

    pub const PRICE: &[&str] = &[
        r"\$\s*[\d,]+(?:\.\d{2})?(?:\s*(?:MXN|USD|pesos))?",
        r"[\d,]+(?:\.\d{2})?\s*(?:MXN|USD|pesos)",
        r"(?:MXN|USD)\s*[\d,]+(?:\.\d{2})?",
        r"\d{1,3}(?:,\d{3})*\s*(?:mil|mill(?:ó|o)n(?:es)?)",
    ];
}
