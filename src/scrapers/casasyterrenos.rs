//! CasasyTerrenos search-results parser.
//!
//! The current markup is Tailwind-flavored (`w-[320px]` card wrappers with
//! styled spans); the cascades keep the pre-redesign class names behind them
//! so a rollback on their side does not zero the scrape.

use scraper::{ElementRef, Html, Selector};

use crate::config::{OperationType, Site};
use crate::extract::{
    first_attr, first_text, first_text_where, looks_like_price, normalize_url, or_sentinel,
    patterns, regex_first, select_cards, LISTING_CARD_MIN_TITLE,
};
use crate::models::{ListingRecord, LISTING_SENTINEL};
use crate::scrapers::traits::SiteScraper;

const CARD_SELECTORS: &[&str] = &[
    r#"div[class*='mx-2'][class*='w-[320px]']"#,
    r#"div[class*='w-[320px]']"#,
    ".property-card",
    ".listing-item",
    ".property-item",
    ".inmueble-item",
    "div[class*='property']",
    "div[class*='inmueble']",
    "div[class*='listing']",
    "article",
    "div[class*='card']",
    "div[class*='resultado']",
];

const TITLE_SELECTORS: &[&str] = &[
    "span[class*='text-text-primary font-bold line-clamp-2']",
    "span[class*='text-text-primary']",
    "span[class*='font-bold']",
    "h2 a",
    "h3 a",
    ".property-title a",
    ".titulo-inmueble a",
    "h2",
    "h3",
    ".property-title",
    ".titulo-inmueble",
    ".title",
    "a[href*='detalle']",
    "a[href*='propiedad']",
];

const LINK_SELECTORS: &[&str] = &[
    "a[target='_blank']",
    "a[href*='casasyterrenos.com']",
    "a[href*='detalle']",
    "a[href*='propiedad']",
    "a[href*='inmueble']",
    "h2 a",
    "h3 a",
    ".property-title a",
    "a",
];

const LOCATION_SELECTORS: &[&str] = &[
    "span[class*='text-blue-cyt']:not([class*='font-bold'])",
    "span[class*='text-blue-cyt']",
    ".location",
    ".ubicacion",
    ".property-location",
    ".ubicacion-inmueble",
    "[class*='location']",
    "[class*='ubicacion']",
    "[class*='address']",
];

const PRICE_SELECTORS: &[&str] = &[
    "span[class*='text-blue-cyt font-bold']",
    "span[class*='font-bold'][class*='blue']",
    ".price",
    ".precio",
    ".property-price",
    ".precio-inmueble",
    "[class*='price']",
    "[class*='precio']",
    "[class*='cost']",
];

/// Feature rows come in fixed order: bedrooms, bathrooms, parking, area.
const FEATURE_SELECTORS: &[&str] = &[
    "p[class*='text-sm']",
    "p.text-sm",
    ".features p",
    ".caracteristicas p",
    ".details p",
];

pub struct CasasYTerrenosScraper {
    operation: OperationType,
}

impl CasasYTerrenosScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }

    fn parse_card(&self, card: &ElementRef) -> ListingRecord {
        let mut rec = ListingRecord::empty(self.operation);

        rec.title = or_sentinel(
            first_text(card, TITLE_SELECTORS, LISTING_CARD_MIN_TITLE),
            LISTING_SENTINEL,
        );
        rec.url = or_sentinel(
            first_attr(card, LINK_SELECTORS, "href")
                .and_then(|href| normalize_url(Site::CasasYTerrenos.base_url(), &href)),
            LISTING_SENTINEL,
        );
        rec.location = or_sentinel(first_text(card, LOCATION_SELECTORS, 4), LISTING_SENTINEL);
        rec.price = or_sentinel(
            first_text_where(card, PRICE_SELECTORS, looks_like_price),
            LISTING_SENTINEL,
        );

        self.assign_positional_features(card, &mut rec);
        rec.code = or_sentinel(self.find_code(card), LISTING_SENTINEL);

        // Whatever the selectors missed, try to recover from the card text.
        let card_text = card.text().collect::<String>();
        if rec.bedrooms == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, patterns::BEDROOMS) {
                rec.bedrooms = v;
            }
        }
        if rec.bathrooms == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, patterns::BATHROOMS) {
                rec.bathrooms = v;
            }
        }
        if rec.area == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text, patterns::AREA) {
                rec.area = v.replace(',', "");
            }
        }

        rec
    }

    fn assign_positional_features(&self, card: &ElementRef, rec: &mut ListingRecord) {
        let features = FEATURE_SELECTORS
            .iter()
            .map(|s| crate::extract::all_texts(card, s))
            .find(|found| !found.is_empty())
            .unwrap_or_default();
        if features.len() < 4 {
            return;
        }
        let take = |slot: &str| -> Option<String> {
            let slot = slot.trim();
            (!slot.is_empty() && slot != "-").then(|| slot.to_string())
        };
        if let Some(v) = take(&features[0]) {
            rec.bedrooms = v;
        }
        if let Some(v) = take(&features[1]) {
            rec.bathrooms = v;
        }
        if let Some(v) = take(&features[2]) {
            rec.parking = v;
        }
        if let Some(v) = take(&features[3]) {
            rec.area = v;
        }
    }

    /// The listing code is labeled inline ("Código: ABC123") rather than
    /// carried by a dedicated class.
    fn find_code(&self, card: &ElementRef) -> Option<String> {
        let span_sel = Selector::parse("span").ok()?;
        for span in card.select(&span_sel) {
            let text = span.text().collect::<String>();
            if let Some(rest) = text.trim().strip_prefix("Código:") {
                let code = rest.trim();
                if !code.is_empty() {
                    return Some(code.to_string());
                }
            }
        }
        first_attr(card, &["*[data-id]"], "data-id")
            .or_else(|| first_attr(card, &["*[data-property-id]"], "data-property-id"))
    }
}

impl SiteScraper for CasasYTerrenosScraper {
    fn site(&self) -> Site {
        Site::CasasYTerrenos
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
