//! Trovit aggregator parser.
//!
//! Trovit pages mix result cards with image carousels that reuse the same
//! class vocabulary, so the card cascade carries `:not([class*='image'])`
//! guards. The card title doubles as the description; Trovit rarely shows a
//! separate blurb.

use scraper::{ElementRef, Html};

use crate::config::{OperationType, Site};
use crate::extract::{
    first_attr, first_text, normalize_url, or_sentinel, patterns, regex_first, select_cards,
};
use crate::models::{ListingRecord, LISTING_SENTINEL};
use crate::scrapers::traits::SiteScraper;

const CARD_SELECTORS: &[&str] = &[
    ".search-result-item",
    ".listing-item",
    ".property-listing",
    "article[class*='listing']",
    "div[class*='result']:not([class*='image'])",
    ".serp-item",
    ".ad-container",
    ".listing-container",
    ".listing-card",
    ".ad-overview",
    ".listing",
    ".property-item",
    "div[class*='listing']:not([class*='image']):not([class*='carousel'])",
    "div[class*='card']:not([class*='image'])",
    "div[class*='item']:not([class*='image']):not([class*='carousel'])",
    "article",
];

const TITLE_SELECTORS: &[&str] = &[
    "h2 a",
    "h3 a",
    "h4 a",
    ".listing-card__title a",
    ".ad-overview__title a",
    ".title a",
    ".listing-title a",
    ".property-title a",
    ".result-title a",
    "h2",
    "h3",
    "h4",
    ".listing-card__title",
    ".ad-overview__title",
    ".title",
    ".listing-title",
    ".property-title",
    ".result-title",
    "a[title]",
    "a",
    "[class*='title']",
    "[class*='name']",
];

const LINK_SELECTORS: &[&str] = &[
    "h2 a",
    "h3 a",
    ".listing-card__title a",
    ".ad-overview__title a",
    ".title a",
    ".listing-title a",
    ".property-title a",
    ".result-title a",
    "a[href*='trovit.com']",
    "a",
];

const PRICE_SELECTORS: &[&str] = &[
    ".price",
    ".listing-card__price",
    ".ad-overview__price",
    ".serp-price",
    ".result-price",
    ".property-price",
    ".cost",
    ".amount",
    "[class*='price']",
    "[class*='precio']",
    "[class*='cost']",
];

const LOCATION_SELECTORS: &[&str] = &[
    ".location",
    ".listing-card__location",
    ".ad-overview__location",
    ".serp-location",
    ".result-location",
    ".property-location",
    ".address",
    ".zone",
    "[class*='location']",
    "[class*='address']",
    "[class*='zone']",
];

const AREA_SELECTORS: &[&str] = &[
    ".size",
    ".surface",
    ".area",
    ".listing-card__size",
    ".ad-overview__size",
    ".result-size",
    ".property-size",
    ".dimensions",
    "[class*='size']",
    "[class*='area']",
    "[class*='surface']",
];

const ROOMS_SELECTORS: &[&str] = &[
    ".rooms",
    ".bedrooms",
    ".listing-card__rooms",
    ".ad-overview__rooms",
    ".result-rooms",
    ".property-rooms",
    ".dormitorios",
    "[class*='room']",
    "[class*='bedroom']",
    "[class*='dormitorio']",
];

const BATHROOMS_SELECTORS: &[&str] = &[
    ".bathrooms",
    ".listing-card__bathrooms",
    ".ad-overview__bathrooms",
    ".result-bathrooms",
    ".property-bathrooms",
    ".banos",
    "[class*='bathroom']",
    "[class*='bano']",
    "[class*='bath']",
];

/// Last-resort price scan over the whole card text, broadest pattern last.
const PRICE_TEXT_PATTERNS: &[&str] = &[
    r"\$\s*[\d,]+(?:\.\d{2})?(?:\s*(?:MXN|USD|pesos))?",
    r"(?i)(?:Precio|Price|Desde|From|Venta|Sale|Renta|Rent|Costo|Cost)[:\s]*\$?\s*[\d,]+(?:\.\d{2})?",
    r"(?i)\d{1,3}(?:,\d{3})*\s*(?:mil|thousand|mill|k)",
    r"[\d,]+(?:\.\d{2})?\s*(?:MXN|USD|pesos)",
    r"(?:MXN|USD)\s*[\d,]+(?:\.\d{2})?",
    r"\d{4,}(?:,\d{3})*(?:\.\d{2})?",
];

const LOCATION_TEXT_PATTERNS: &[&str] = &[
    r"(?i)(?:en|ubicado en)\s+([^,\n]+(?:,\s*[^,\n]+)*)",
    r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*,\s*(?:Jalisco|CDMX|DF|Ciudad de México))",
    r"(Col\.\s+[^,\n]+)",
    r"([^,\n]+,\s*(?:Jalisco|CDMX|DF|Ciudad de México))",
    r"(?:Zapopan|Guadalajara|Tlaquepaque|Tonalá)[^,\n]*",
];

pub struct TrovitScraper {
    operation: OperationType,
}

impl TrovitScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }

    fn parse_card(&self, card: &ElementRef) -> ListingRecord {
        let mut rec = ListingRecord::empty(self.operation);

        if let Some(title) = first_text(card, TITLE_SELECTORS, 4) {
            rec.title = title.clone();
            rec.description = title;
        }
        rec.url = or_sentinel(
            first_attr(card, LINK_SELECTORS, "href")
                .and_then(|href| normalize_url(Site::Trovit.base_url(), &href)),
            LISTING_SENTINEL,
        );
        rec.price = or_sentinel(
            first_text(card, PRICE_SELECTORS, 1).filter(|t| {
                t.contains('$')
                    || t.contains("MXN")
                    || t.contains("USD")
                    || t.chars().any(|c| c.is_ascii_digit())
            }),
            LISTING_SENTINEL,
        );
        rec.location = or_sentinel(first_text(card, LOCATION_SELECTORS, 4), LISTING_SENTINEL);
        rec.area = or_sentinel(first_text(card, AREA_SELECTORS, 1), LISTING_SENTINEL);
        rec.bedrooms = or_sentinel(first_text(card, ROOMS_SELECTORS, 1), LISTING_SENTINEL);
        rec.bathrooms = or_sentinel(first_text(card, BATHROOMS_SELECTORS, 1), LISTING_SENTINEL);

        let card_text = card.text().collect::<String>();
        if rec.price == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, PRICE_TEXT_PATTERNS) {
                rec.price = v;
            }
        }
        if rec.location == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, LOCATION_TEXT_PATTERNS) {
                rec.location = v;
            }
        }
        if rec.area == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, patterns::AREA) {
                rec.area = v.replace(',', "");
            }
        }
        if rec.bedrooms == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, patterns::BEDROOMS) {
                rec.bedrooms = v;
            }
        }

        rec
    }
}

impl SiteScraper for TrovitScraper {
    fn site(&self) -> Site {
        Site::Trovit
    }

    fn parse_listing_page(&self, html: &str) -> Vec<ListingRecord> {
        let doc = Html::parse_document(html);
        select_cards(&doc, CARD_SELECTORS)
            .iter()
            .map(|card| self.parse_card(card))
            .filter(ListingRecord::has_substance)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
    <html><body>
      <div class="search-result-item">
        <h3><a href="/anuncio/casa-chapalita-31">Casa en Chapalita remodelada</a></h3>
        <div class="result-price">$3,200,000 MXN</div>
        <div class="result-location">Chapalita, Zapopan</div>
        <div class="result-size">160 m²</div>
        <div class="result-rooms">3</div>
        <div class="result-bathrooms">2</div>
      </div>
    </body></html>
    "#;

    #[test]
    fn golden_card() {
        let scraper = TrovitScraper::new(OperationType::Venta);
        let records = scraper.parse_listing_page(FIXTURE);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.title, "Casa en Chapalita remodelada");
        assert_eq!(rec.description, "Casa en Chapalita remodelada");
        assert_eq!(rec.url, "https://casas.trovit.com.mx/anuncio/casa-chapalita-31");
        assert_eq!(rec.price, "$3,200,000 MXN");
        assert_eq!(rec.location, "Chapalita, Zapopan");
        assert_eq!(rec.area, "160 m²");
        assert_eq!(rec.bedrooms, "3");
        assert_eq!(rec.bathrooms, "2");
    }

    #[test]
    fn price_recovered_from_card_text() {
        let html = r#"
        <article class="listing">
          <h3>Departamento céntrico</h3>
          <span>Desde $1,150,000 en preventa</span>
        </article>"#;
        let scraper = TrovitScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.price, "$1,150,000");
    }

    #[test]
    fn location_recovered_from_card_text() {
        let html = r#"
        <div class="serp-item">
          <h3>Terreno amplio plano</h3>
          <p>Oportunidad en Tlaquepaque cerca del centro</p>
        </div>"#;
        let scraper = TrovitScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.location, "Tlaquepaque cerca del centro");
    }

    #[test]
    fn empty_page_yields_no_records() {
        let scraper = TrovitScraper::new(OperationType::Venta);
        assert!(scraper.parse_listing_page("<html><body></body></html>").is_empty());
    }
}
