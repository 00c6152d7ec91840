//! Lamudi parsers: search-result cards and individual property pages.
//!
//! Lamudi has cycled through three generations of markup (`data-testid`
//! attributes, `ListingCell-*` classes, `snippet__*` classes); the cascades
//! list all of them, newest first.

use scraper::{ElementRef, Html};

use crate::config::{OperationType, Site};
use crate::extract::{
    all_texts, first_attr, first_text, first_text_where, looks_like_price, normalize_url,
    numeric_like, or_sentinel, patterns, regex_first, select_cards, truncate_chars,
};
use crate::models::{DetailRecord, ListingRecord, DETAIL_SENTINEL, LISTING_SENTINEL};
use crate::scrapers::traits::{DetailScraper, SiteScraper};

const CARD_SELECTORS: &[&str] = &[
    "[data-testid='listing-card']",
    ".ListingCell-row",
    ".listing-item",
    "div.snippet.js-snippet.normal",
    "div.snippet",
    "div[class*='property']",
    "div[class*='listing']",
    "div[class*='card']",
    "article",
];

const TITLE_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-title'] a",
    ".ListingCell-KeyInfo-title a",
    ".listing-title a",
    "h3 a",
    "h2 a",
    "span.snippet__content__title",
    ".snippet__content__title",
    ".title a",
    ".property-title a",
];

const LINK_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-title'] a",
    ".ListingCell-KeyInfo-title a",
    "a[href*='lamudi.com']",
    "a",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "div.snippet__content__description",
    ".snippet__content__description",
    ".ListingCell-KeyInfo-description",
    ".listing-description",
    ".description",
    "p",
];

const LOCATION_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-location']",
    ".ListingCell-KeyInfo-address",
    ".listing-location",
    ".location",
    ".address",
    "span[data-test='snippet-content-location']",
    "[data-test='snippet-content-location']",
    "[class*='location']",
    "[class*='address']",
];

const PRICE_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-price']",
    ".ListingCell-KeyInfo-price",
    ".listing-price",
    ".price",
    ".precio",
    "div.snippet__content__price",
    ".snippet__content__price",
    "[class*='price']",
    "[class*='precio']",
];

const BEDROOMS_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-bedrooms']",
    "[data-testid='bedrooms-value']",
    "span[data-test='bedrooms-value']",
    "[data-test='bedrooms-value']",
    "[class*='bedroom']",
    "[class*='habitacion']",
];

const BATHROOMS_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-bathrooms']",
    "[data-testid='bathrooms-value']",
    "span[data-test='full-bathrooms-value']",
    "[data-test='full-bathrooms-value']",
    "[data-test='bathrooms-value']",
    "[class*='bathroom']",
    "[class*='bath']",
];

const AREA_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-area']",
    "[data-testid='area-value']",
    "span[data-test='area-value']",
    "[data-test='area-value']",
    "[class*='area']",
    "[class*='superficie']",
];

const PARKING_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-parking']",
    "[data-testid='parking-value']",
    "span[data-test='parking-value']",
    "[data-test='parking-value']",
    "[class*='parking']",
    "[class*='estacionamiento']",
    "[class*='garage']",
];

pub struct LamudiScraper {
    operation: OperationType,
}

impl LamudiScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }

    fn parse_card(&self, card: &ElementRef) -> ListingRecord {
        let mut rec = ListingRecord::empty(self.operation);

        rec.title = or_sentinel(first_text(card, TITLE_SELECTORS, 4), LISTING_SENTINEL);
        rec.url = or_sentinel(
            first_attr(card, LINK_SELECTORS, "href")
                .and_then(|href| normalize_url(Site::Lamudi.base_url(), &href)),
            LISTING_SENTINEL,
        );
        rec.description = or_sentinel(
            first_text(card, DESCRIPTION_SELECTORS, 11).map(|d| truncate_chars(&d, 500)),
            LISTING_SENTINEL,
        );
        rec.location = or_sentinel(first_text(card, LOCATION_SELECTORS, 4), LISTING_SENTINEL);
        rec.price = or_sentinel(
            first_text_where(card, PRICE_SELECTORS, looks_like_price),
            LISTING_SENTINEL,
        );
        rec.bedrooms = or_sentinel(
            first_text_where(card, BEDROOMS_SELECTORS, numeric_like),
            LISTING_SENTINEL,
        );
        rec.bathrooms = or_sentinel(
            first_text_where(card, BATHROOMS_SELECTORS, numeric_like),
            LISTING_SENTINEL,
        );
        rec.area = or_sentinel(
            first_text_where(card, AREA_SELECTORS, |t| {
                t.contains("m²") || t.contains("mt2") || t.chars().any(|c| c.is_ascii_digit())
            })
            .map(|t| regex_first(&t, &[r"(\d+(?:,\d+)?)"]).unwrap_or(t).replace(',', "")),
            LISTING_SENTINEL,
        );
        rec.parking = or_sentinel(
            first_text_where(card, PARKING_SELECTORS, numeric_like),
            LISTING_SENTINEL,
        );

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
}

impl SiteScraper for LamudiScraper {
    fn site(&self) -> Site {
        Site::Lamudi
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

/// Detail-page parser (second phase, individual property URLs).
pub struct LamudiDetailScraper {
    operation: OperationType,
}

impl LamudiDetailScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }
}

impl DetailScraper for LamudiDetailScraper {
    fn site(&self) -> Site {
        Site::Lamudi
    }

    fn parse_detail_page(&self, html: &str, url: &str) -> Option<DetailRecord> {
        let doc = Html::parse_document(html);
        let root = doc.root_element();
        let mut rec = DetailRecord::empty(url, self.operation);

        rec.title = or_sentinel(
            first_text(
                &root,
                &[
                    "h1[data-testid='listing-title']",
                    "h1.listing-title",
                    "h1.property-title",
                    "h1",
                ],
                4,
            ),
            DETAIL_SENTINEL,
        );
        rec.price = or_sentinel(
            first_text_where(
                &root,
                &[
                    "[data-testid='listing-price']",
                    ".listing-price",
                    ".property-price",
                    ".price",
                ],
                looks_like_price,
            ),
            DETAIL_SENTINEL,
        );
        rec.location = or_sentinel(
            first_text(
                &root,
                &[
                    "[data-testid='listing-address']",
                    ".listing-address",
                    ".property-address",
                    ".address",
                ],
                4,
            ),
            DETAIL_SENTINEL,
        );
        rec.property_type = or_sentinel(
            first_text(
                &root,
                &[
                    "[data-testid='property-type']",
                    ".property-type",
                    ".listing-type",
                ],
                3,
            ),
            DETAIL_SENTINEL,
        );
        rec.total_area = or_sentinel(
            first_text(
                &root,
                &[
                    "[data-testid='property-area']",
                    ".property-area",
                    ".listing-area",
                    ".area",
                ],
                1,
            ),
            DETAIL_SENTINEL,
        );
        rec.description = or_sentinel(
            first_text(
                &root,
                &[
                    "[data-testid='property-description']",
                    ".property-description",
                    ".listing-description",
                    ".description",
                ],
                11,
            ),
            DETAIL_SENTINEL,
        );

        let feature_items = [
            "[data-testid='property-features'] li",
            ".property-features li",
            ".listing-features li",
            ".property-features .feature-item",
        ]
        .iter()
        .map(|s| all_texts(&root, s))
        .find(|found| !found.is_empty())
        .unwrap_or_default();
        if !feature_items.is_empty() {
            rec.features = feature_items.join(" | ");
        }

        let amenity_items = [
            "[data-testid='property-amenities'] li",
            ".property-amenities li",
            ".amenities li",
            ".services li",
        ]
        .iter()
        .map(|s| all_texts(&root, s))
        .find(|found| !found.is_empty())
        .unwrap_or_default();
        if !amenity_items.is_empty() {
            // Shares the features column; amenities follow the main specs.
            rec.features = if rec.features == DETAIL_SENTINEL {
                amenity_items.join(" | ")
            } else {
                format!("{} | {}", rec.features, amenity_items.join(" | "))
            };
        }

        rec.advertiser = or_sentinel(
            first_text(
                &root,
                &["[data-testid='agent-info']", ".agent-info", ".contact-info"],
                3,
            ),
            DETAIL_SENTINEL,
        );

        rec.has_substance().then_some(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_FIXTURE: &str = r#"
    <html><body>
      <div data-testid="listing-card">
        <div data-testid="listing-card-title"><a href="/departamento-roma-norte-123">Departamento en Roma Norte</a></div>
        <div data-testid="listing-card-location">Roma Norte, Cuauhtémoc</div>
        <div data-testid="listing-card-price">$ 18,500 MXN</div>
        <span data-testid="bedrooms-value">2</span>
        <span data-testid="bathrooms-value">1</span>
        <span data-testid="area-value">85 m²</span>
        <span data-testid="parking-value">1</span>
      </div>
    </body></html>
    "#;

    #[test]
    fn golden_listing_card() {
        let scraper = LamudiScraper::new(OperationType::Renta);
        let records = scraper.parse_listing_page(LISTING_FIXTURE);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.title, "Departamento en Roma Norte");
        assert_eq!(rec.url, "https://www.lamudi.com.mx/departamento-roma-norte-123");
        assert_eq!(rec.location, "Roma Norte, Cuauhtémoc");
        assert_eq!(rec.price, "$ 18,500 MXN");
        assert_eq!(rec.bedrooms, "2");
        assert_eq!(rec.bathrooms, "1");
        assert_eq!(rec.area, "85");
        assert_eq!(rec.parking, "1");
        assert_eq!(rec.operation, "renta");
    }

    #[test]
    fn legacy_markup_still_parses() {
        let html = r#"
        <div class="ListingCell-row">
          <div class="ListingCell-KeyInfo-title"><a href="/casa-legacy">Casa con jardín amplio</a></div>
          <div class="ListingCell-KeyInfo-price">$2,300,000</div>
          <div class="ListingCell-KeyInfo-address">Zapopan, Jalisco</div>
        </div>"#;
        let scraper = LamudiScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.title, "Casa con jardín amplio");
        assert_eq!(rec.price, "$2,300,000");
        assert_eq!(rec.location, "Zapopan, Jalisco");
    }

    #[test]
    fn regex_rescues_counts_from_card_text() {
        let html = r#"
        <div class="listing-item">
          <h3 a><a href="/x">Casa sola en esquina</a></h3>
          <p>Bonita casa, 3 recámaras, 2 baños, terreno 140 m²</p>
        </div>"#;
        let scraper = LamudiScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.bedrooms, "3");
        assert_eq!(rec.bathrooms, "2");
        assert_eq!(rec.area, "140");
    }

    #[test]
    fn detail_page_requires_title_or_price() {
        let scraper = LamudiDetailScraper::new(OperationType::Venta);
        assert!(scraper
            .parse_detail_page("<html><body><p>nada</p></body></html>", "https://x.mx")
            .is_none());

        let html = r#"
        <html><body>
          <h1 data-testid="listing-title">Casa en Polanco</h1>
          <div data-testid="listing-price">$12,000,000</div>
          <div data-testid="property-features"><ul><li>3 recámaras</li><li>4 baños</li></ul></div>
        </body></html>"#;
        let rec = scraper.parse_detail_page(html, "https://www.lamudi.com.mx/p/1").unwrap();
        assert_eq!(rec.title, "Casa en Polanco");
        assert_eq!(rec.features, "3 recámaras | 4 baños");
        assert_eq!(rec.bedrooms, DETAIL_SENTINEL);
    }
}
