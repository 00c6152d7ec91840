//! Propiedades.com parser.
//!
//! The portal sits behind Cloudflare and serves markup with no stable card
//! classes, so this parser works heuristically: a wide card cascade whose
//! hits are only kept when their text reads like a property ad (at least two
//! domain indicators and a substantial amount of text), then regex-heavy
//! field extraction over the card text.

use scraper::{ElementRef, Html, Selector};

use crate::config::{OperationType, Site};
use crate::extract::{first_text, normalize_url, or_sentinel, regex_first, truncate_chars};
use crate::models::{ListingRecord, LISTING_SENTINEL};
use crate::scrapers::traits::SiteScraper;

const CARD_SELECTORS: &[&str] = &[
    ".ad",
    ".property-card",
    ".listing-card",
    ".property-item",
    ".listing-item",
    ".result-item",
    ".search-result",
    "[data-property]",
    "[data-listing]",
    "[data-ad]",
    "[data-item]",
    "[data-card]",
    "[data-result]",
    "[id*='property']",
    "[id*='listing']",
    "[id*='result']",
    "[class*='property']",
    "[class*='listing']",
    "[class*='result']",
    "[class*='card']",
    "[class*='item']",
    "[class*='ad']",
    "article",
    "section",
    "li",
    "div[class]",
];

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    ".title",
    ".name",
    ".titulo",
    ".property-title",
    ".ad-title",
    ".listing-title",
    "a[href*='inmueble']",
    "a[href*='propiedad']",
    "a",
];

const PROPERTY_INDICATORS: &[&str] = &[
    "venta",
    "renta",
    "precio",
    "$",
    "terreno",
    "casa",
    "departamento",
    "m²",
    "ubicación",
];

const PRICE_TEXT_PATTERNS: &[&str] = &[
    r"\$\s*[\d,]+(?:\.\d{2})?(?:\s*(?:MXN|USD|pesos))?",
    r"(?i)(?:Precio|Price|Desde|From|Venta|Sale|Renta|Rent|Costo|Cost)[:\s]*\$?\s*[\d,]+",
    r"(?i)\d{1,3}(?:,\d{3})*\s*(?:mil|thousand|mill|k)",
    r"[\d,]+(?:\.\d{2})?\s*(?:MXN|USD|pesos)",
    r"(?:MXN|USD)\s*[\d,]+",
    r"\d{4,}(?:,\d{3})*",
];

const LOCATION_TEXT_PATTERNS: &[&str] = &[
    r"(?i)(?:en|ubicado en)\s+([^,\n]+)",
    r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*,\s*(?:Jalisco|Guadalajara|Zapopan))",
    r"(Col\.\s+[^,\n]+)",
    r"([^,\n]+,\s*(?:Jalisco|Guadalajara|Zapopan))",
    r"(?:Zapopan|Guadalajara|Tlaquepaque|Tonalá)[^,\n]*",
];

pub struct PropiedadesScraper {
    operation: OperationType,
}

impl PropiedadesScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }

    /// Does this element's text read like a property ad? Requires at least
    /// two domain indicators and more than 50 chars of text.
    fn looks_like_property_card(text: &str) -> bool {
        let lower = text.to_lowercase();
        let hits = PROPERTY_INDICATORS
            .iter()
            .filter(|ind| lower.contains(*ind))
            .count();
        hits >= 2 && text.len() > 50
    }

    /// First selector whose hits include validated cards wins; generic
    /// fallbacks like `li` only come into play when nothing structured
    /// matched.
    fn select_validated_cards<'a>(doc: &'a Html) -> Vec<ElementRef<'a>> {
        for raw in CARD_SELECTORS {
            let Ok(sel) = Selector::parse(raw) else {
                continue;
            };
            let valid: Vec<ElementRef<'a>> = doc
                .select(&sel)
                .filter(|el| {
                    let text = el.text().collect::<String>();
                    Self::looks_like_property_card(&text)
                })
                .collect();
            if !valid.is_empty() {
                tracing::debug!("Found {} validated cards with selector {raw}", valid.len());
                return valid;
            }
        }
        Vec::new()
    }

    fn parse_card(&self, card: &ElementRef) -> ListingRecord {
        let mut rec = ListingRecord::empty(self.operation);
        let card_text = card.text().collect::<String>();

        if let Some(title) = first_text(card, TITLE_SELECTORS, 11) {
            let title = truncate_chars(&title, 200);
            rec.title = title.clone();
            rec.description = title;
        } else if let Some(sentence) = card_text
            .split('.')
            .map(str::trim)
            .find(|s| s.len() > 20)
        {
            let head = truncate_chars(sentence, 200);
            rec.title = head.clone();
            rec.description = head;
        }

        rec.url = or_sentinel(self.find_property_link(card), LISTING_SENTINEL);
        rec.price = or_sentinel(
            regex_first(&card_text, PRICE_TEXT_PATTERNS).map(|p| truncate_chars(&p, 50)),
            LISTING_SENTINEL,
        );
        rec.location = or_sentinel(
            regex_first(&card_text, LOCATION_TEXT_PATTERNS)
                .filter(|l| l.len() > 3)
                .map(|l| truncate_chars(&l, 100)),
            LISTING_SENTINEL,
        );

        rec
    }

    /// Only links that point at an actual property page count.
    fn find_property_link(&self, card: &ElementRef) -> Option<String> {
        let sel = Selector::parse("a[href]").ok()?;
        for link in card.select(&sel) {
            let href = link.value().attr("href")?.trim();
            if href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            if href.contains("inmueble") || href.contains("propiedad") || href.contains("terreno") {
                return normalize_url(Site::Propiedades.base_url(), href);
            }
        }
        None
    }
}

impl SiteScraper for PropiedadesScraper {
    fn site(&self) -> Site {
        Site::Propiedades
    }

    fn parse_listing_page(&self, html: &str) -> Vec<ListingRecord> {
        let doc = Html::parse_document(html);
        Self::select_validated_cards(&doc)
            .iter()
            .map(|card| self.parse_card(card))
            .filter(|rec| {
                rec.title != LISTING_SENTINEL
                    || rec.price != LISTING_SENTINEL
                    || rec.url != LISTING_SENTINEL
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
    <html><body>
      <div class="property-card">
        <h3>Casa en venta en Valle Real con jardín</h3>
        <p>Amplia casa de dos plantas en Zapopan, precio $6,900,000 MXN, terreno de 300 m²</p>
        <a href="/inmueble/casa-valle-real-42">Ver detalle</a>
      </div>
      <div class="property-card">
        short text
      </div>
    </body></html>
    "#;

    #[test]
    fn golden_card_with_heuristic_validation() {
        let scraper = PropiedadesScraper::new(OperationType::Venta);
        let records = scraper.parse_listing_page(FIXTURE);
        // The second div fails the indicator check and is dropped.
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.title, "Casa en venta en Valle Real con jardín");
        assert_eq!(rec.url, "https://propiedades.com/inmueble/casa-valle-real-42");
        assert_eq!(rec.price, "$6,900,000 MXN");
    }

    #[test]
    fn card_without_indicators_is_rejected() {
        assert!(!PropiedadesScraper::looks_like_property_card(
            "un bloque de navegación cualquiera con texto suficientemente largo"
        ));
        assert!(PropiedadesScraper::looks_like_property_card(
            "Casa en venta, precio $2,500,000, excelente ubicación en zona norte"
        ));
    }

    #[test]
    fn anchor_links_are_ignored() {
        let html = r##"
        <div class="listing-item">
          <h3>Departamento en renta zona centro</h3>
          <p>Renta $12,000 mensuales, departamento amueblado de 80 m²</p>
          <a href="#">arriba</a>
          <a href="javascript:void(0)">menu</a>
        </div>"##;
        let scraper = PropiedadesScraper::new(OperationType::Renta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.url, LISTING_SENTINEL);
    }

    #[test]
    fn challenge_page_yields_nothing() {
        let scraper = PropiedadesScraper::new(OperationType::Venta);
        let html = "<html><body><h1>Just a moment...</h1></body></html>";
        assert!(scraper.parse_listing_page(html).is_empty());
    }
}
