//! Mitula aggregator parser.
//!
//! Mitula relists other portals' ads, so cards are noisier than a first-party
//! portal: prices must carry a currency token to be believed, and the
//! description slot only accepts long paragraphs to keep breadcrumb text out.

use scraper::{ElementRef, Html};

use crate::config::{OperationType, Site};
use crate::extract::{
    all_texts, first_attr, first_text, first_text_where, normalize_url, or_sentinel, patterns,
    regex_first, select_cards, truncate_chars,
};
use crate::models::{ListingRecord, LISTING_SENTINEL};
use crate::scrapers::traits::SiteScraper;

const CARD_SELECTORS: &[&str] = &[
    ".listing-card",
    ".ad-overview",
    ".listing",
    ".property-item",
    ".serp-item",
    "div[class*='listing']",
    "div[class*='card']",
];

const TITLE_SELECTORS: &[&str] = &[
    "h2 a",
    "h3 a",
    ".listing-card__title a",
    ".ad-overview__title a",
    ".title a",
    "h2",
    "h3",
    ".title",
    "a[href*='property']",
];

const PRICE_SELECTORS: &[&str] = &[
    ".price",
    ".listing-card__price",
    ".ad-overview__price",
    ".serp-price",
    "[class*='price']",
    "[class*='cost']",
];

const LOCATION_SELECTORS: &[&str] = &[
    ".location",
    ".listing-card__location",
    ".ad-overview__location",
    ".serp-location",
    "[class*='location']",
    "[class*='address']",
];

const AREA_SELECTORS: &[&str] = &[
    ".size",
    ".surface",
    ".area",
    ".listing-card__size",
    ".ad-overview__size",
    "[class*='size']",
    "[class*='area']",
];

const ROOMS_SELECTORS: &[&str] = &[
    ".rooms",
    ".bedrooms",
    ".listing-card__rooms",
    ".ad-overview__rooms",
    "[class*='room']",
    "[class*='bedroom']",
];

const BATHROOM_SELECTORS: &[&str] = &[
    ".bathrooms",
    ".listing-card__bathrooms",
    ".ad-overview__bathrooms",
    "[class*='bathroom']",
    "[class*='bath']",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".description",
    ".listing-card__description",
    ".ad-overview__description",
    "[class*='description']",
    "p",
];

const FALLBACK_LINK_SELECTORS: &[&str] = &[
    "a[href*='property']",
    "a[href*='casa']",
    "a[href*='departamento']",
    "a",
];

pub struct MitulaScraper {
    operation: OperationType,
}

impl MitulaScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }

    fn parse_card(&self, card: &ElementRef) -> ListingRecord {
        let mut rec = ListingRecord::empty(self.operation);

        rec.title = or_sentinel(first_text(card, TITLE_SELECTORS, 1), LISTING_SENTINEL);
        // The title anchor usually carries the outbound link too.
        rec.url = or_sentinel(
            first_attr(card, TITLE_SELECTORS, "href")
                .or_else(|| first_attr(card, FALLBACK_LINK_SELECTORS, "href"))
                .and_then(|href| normalize_url(Site::Mitula.base_url(), &href)),
            LISTING_SENTINEL,
        );
        // Aggregator cards show plenty of numbers; only a currency marker
        // distinguishes the price from an area or an ad id.
        rec.price = or_sentinel(
            first_text_where(card, PRICE_SELECTORS, |t| {
                t.contains('$') || t.contains("MXN")
            }),
            LISTING_SENTINEL,
        );
        rec.location = or_sentinel(first_text(card, LOCATION_SELECTORS, 4), LISTING_SENTINEL);
        rec.area = or_sentinel(
            first_text_where(card, AREA_SELECTORS, |t| {
                t.contains("m²") || t.contains("sqm")
            })
            .and_then(|t| regex_first(&t, &[r"(\d+(?:,\d+)?)"])),
            LISTING_SENTINEL,
        );
        rec.bedrooms = or_sentinel(
            first_text(card, ROOMS_SELECTORS, 1).and_then(|t| regex_first(&t, &[r"(\d+)"])),
            LISTING_SENTINEL,
        );
        rec.bathrooms = or_sentinel(
            first_text(card, BATHROOM_SELECTORS, 1)
                .and_then(|t| regex_first(&t, &[r"(\d+(?:\.\d+)?)"])),
            LISTING_SENTINEL,
        );
        rec.description = or_sentinel(
            first_text(card, DESCRIPTION_SELECTORS, 51).map(|d| truncate_chars(&d, 500)),
            LISTING_SENTINEL,
        );

        let amenities = self.collect_amenities(card);
        if !amenities.is_empty() && rec.description == LISTING_SENTINEL {
            rec.description = amenities.join(" | ");
        }

        let card_text = card.text().collect::<String>();
        if rec.bedrooms == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text.to_lowercase(), patterns::BEDROOMS) {
                rec.bedrooms = v;
            }
        }
        if rec.bathrooms == LISTING_SENTINEL {
            if let Some(v) = regex_first(&card_text.to_lowercase(), patterns::BATHROOMS) {
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

    /// Short feature chips, capped at five to keep the column readable.
    fn collect_amenities(&self, card: &ElementRef) -> Vec<String> {
        let mut found = Vec::new();
        for selector in [
            ".features",
            ".characteristics",
            ".listing-card__features",
            ".ad-overview__features",
            "[class*='feature']",
        ] {
            for text in all_texts(card, selector) {
                if text.len() < 100 && !found.contains(&text) {
                    found.push(text);
                }
            }
        }
        found.truncate(5);
        found
    }
}

impl SiteScraper for MitulaScraper {
    fn site(&self) -> Site {
        Site::Mitula
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
      <div class="listing-card">
        <h2><a href="/property/depto-condesa-55">Departamento en la Condesa</a></h2>
        <div class="listing-card__price">$25,000 MXN / mes</div>
        <div class="listing-card__location">Condesa, Ciudad de México</div>
        <div class="listing-card__size">95 m²</div>
        <div class="listing-card__rooms">2 recámaras</div>
        <div class="listing-card__bathrooms">2 baños</div>
      </div>
    </body></html>
    "#;

    #[test]
    fn golden_card() {
        let scraper = MitulaScraper::new(OperationType::Renta);
        let records = scraper.parse_listing_page(FIXTURE);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.title, "Departamento en la Condesa");
        assert_eq!(rec.url, "https://www.mitula.mx/property/depto-condesa-55");
        assert_eq!(rec.price, "$25,000 MXN / mes");
        assert_eq!(rec.location, "Condesa, Ciudad de México");
        assert_eq!(rec.area, "95");
        assert_eq!(rec.bedrooms, "2");
        assert_eq!(rec.bathrooms, "2");
    }

    #[test]
    fn price_without_currency_marker_is_rejected() {
        let html = r#"
        <div class="listing-card">
          <h3>Casa económica</h3>
          <div class="price">Consultar precio</div>
        </div>"#;
        let scraper = MitulaScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.price, LISTING_SENTINEL);
    }

    #[test]
    fn short_description_is_skipped() {
        let html = r#"
        <div class="listing-card">
          <h3>Casa con alberca y jardín</h3>
          <p>muy corta</p>
        </div>"#;
        let scraper = MitulaScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.description, LISTING_SENTINEL);
    }

    #[test]
    fn counts_recovered_from_card_text() {
        let html = r#"
        <div class="listing">
          <h3>Casa sola en privada</h3>
          <span>3 recámaras, 2.5 baños, 180 m² de construcción</span>
        </div>"#;
        let scraper = MitulaScraper::new(OperationType::Venta);
        let rec = &scraper.parse_listing_page(html)[0];
        assert_eq!(rec.bedrooms, "3");
        assert_eq!(rec.bathrooms, "2.5");
        assert_eq!(rec.area, "180");
    }
}
