//! Inmuebles24 parsers.
//!
//! This portal is scraped in two phases. The listing parser only harvests
//! property URLs from result pages (cards carry little reliable data and the
//! detail pages have everything). The detail parser then reads the full
//! property page, including the icon-feature grid and publisher codes.

use scraper::{ElementRef, Html, Selector};

use crate::config::{OperationType, Site};
use crate::extract::{collapse_ws, first_attr, first_text, normalize_url, or_sentinel};
use crate::models::{DetailRecord, ListingRecord, DETAIL_SENTINEL};
use crate::scrapers::traits::{DetailScraper, SiteScraper};

const LINK_SELECTORS: &[&str] = &[
    "h3[data-qa='POSTING_CARD_DESCRIPTION'] a",
    "[data-qa='POSTING_CARD_DESCRIPTION'] a",
    "a[href*='/inmuebles/']",
    "a[href*='inmuebles24.com']",
    ".postingCardLayout-module__posting-card-layout a",
    "h2 a",
    "h3 a",
    ".posting-title a",
];

const INVALID_URL_PARTS: &[&str] = &[
    "javascript:",
    "mailto:",
    "#",
    "/ayuda/",
    "/contacto/",
    "/login",
];

fn is_property_url(href: &str) -> bool {
    if INVALID_URL_PARTS.iter().any(|p| href.contains(p)) {
        return false;
    }
    href.contains("/inmuebles/") || href.contains("inmuebles24.com")
}

/// Phase-one parser: result pages yield URL-only records that feed the
/// detail phase.
pub struct Inmuebles24Scraper {
    operation: OperationType,
}

impl Inmuebles24Scraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }
}

impl SiteScraper for Inmuebles24Scraper {
    fn site(&self) -> Site {
        Site::Inmuebles24
    }

    fn parse_listing_page(&self, html: &str) -> Vec<ListingRecord> {
        let doc = Html::parse_document(html);
        let mut seen: Vec<String> = Vec::new();
        let mut records = Vec::new();

        for raw in LINK_SELECTORS {
            let Ok(sel) = Selector::parse(raw) else {
                continue;
            };
            for link in doc.select(&sel) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                if !is_property_url(href) {
                    continue;
                }
                let Some(url) = normalize_url(Site::Inmuebles24.base_url(), href) else {
                    continue;
                };
                if seen.contains(&url) {
                    continue;
                }
                seen.push(url.clone());

                let mut rec = ListingRecord::empty(self.operation);
                rec.url = url;
                let title = collapse_ws(&link.text().collect::<String>());
                if title.len() > 3 {
                    rec.title = title;
                }
                records.push(rec);
            }
            // The first selector generation that produced links is trusted;
            // broader fallbacks only run on pages where it found nothing.
            if !records.is_empty() {
                break;
            }
        }

        records
    }
}

/// Markers that flag a sponsored (reduced-markup) property page.
const SPONSORED_SELECTORS: &[&str] = &[
    ".sponsored",
    ".patrocinado",
    "[data-sponsored='true']",
    ".premium",
    ".destacado",
    ".featured",
];

const SPONSORED_TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    ".title",
    ".name",
    "[class*='title']",
    "[class*='name']",
];

const SPONSORED_PRICE_SELECTORS: &[&str] =
    &["[class*='price']", "[class*='precio']", ".amount", ".cost"];

const SPONSORED_LOCATION_SELECTORS: &[&str] = &[
    "[class*='location']",
    "[class*='address']",
    "[class*='ubicacion']",
    ".zone",
    ".area",
];

const PHONE_SELECTORS: &[&str] = &[
    "[data-qa='phone']",
    ".phone-number",
    ".contact-phone",
    "[href^='tel:']",
    ".telefono",
];

pub struct Inmuebles24DetailScraper {
    operation: OperationType,
}

impl Inmuebles24DetailScraper {
    pub fn new(operation: OperationType) -> Self {
        Self { operation }
    }

    /// Sponsored pages drop the regular layout entirely; a marker element or
    /// the word on a page missing the regular h1 is enough.
    fn is_sponsored(doc: &Html) -> bool {
        for raw in SPONSORED_SELECTORS {
            let Ok(sel) = Selector::parse(raw) else {
                continue;
            };
            if doc.select(&sel).next().is_some() {
                return true;
            }
        }
        let Ok(h1) = Selector::parse("h1.title-property") else {
            return false;
        };
        if doc.select(&h1).next().is_none() {
            let text = doc.root_element().text().collect::<String>().to_lowercase();
            return text.contains("patrocinado");
        }
        false
    }

    /// Sponsored pages only yield title, price and location.
    fn parse_sponsored(&self, doc: &Html, url: &str) -> Option<DetailRecord> {
        let root = doc.root_element();
        let mut rec = DetailRecord::empty(url, self.operation);
        rec.sponsored = true;
        rec.property_type = "Patrocinada".to_string();

        rec.title = or_sentinel(first_text(&root, SPONSORED_TITLE_SELECTORS, 4), DETAIL_SENTINEL);
        rec.price = or_sentinel(
            first_text(&root, SPONSORED_PRICE_SELECTORS, 2),
            DETAIL_SENTINEL,
        );
        rec.location = or_sentinel(
            first_text(&root, SPONSORED_LOCATION_SELECTORS, 4),
            DETAIL_SENTINEL,
        );

        rec.has_substance().then_some(rec)
    }

    /// The h2 subtitle packs type, area, bedrooms and parking into one line
    /// separated by middle dots or pipes.
    fn parse_subtitle(rec: &mut DetailRecord, root: &ElementRef) {
        let Some(h2) = first_text(root, &["h2.title-type-sup-property"], 1) else {
            return;
        };
        let tokens: Vec<String> = h2
            .replace('·', "|")
            .split('|')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if let Some(t) = tokens.first() {
            rec.property_type = t.clone();
        }
        if let Some(t) = tokens.get(1) {
            rec.total_area = t.clone();
        }
        if let Some(t) = tokens.get(2) {
            if let Some(n) = first_digits(t) {
                rec.bedrooms = n;
            }
        }
        if let Some(t) = tokens.get(3) {
            if let Some(n) = first_digits(t) {
                rec.parking = n;
            }
        }
    }

    fn parse_price(rec: &mut DetailRecord, root: &ElementRef) {
        let Ok(container_sel) = Selector::parse(".price-container-property") else {
            return;
        };
        let Some(container) = root.select(&container_sel).next() else {
            return;
        };
        if let Some(value) = first_text(&container, &[".price-value"], 1) {
            let lower = value.to_lowercase();
            if lower.contains("venta") {
                rec.operation = "venta".to_string();
            } else if lower.contains("renta") {
                rec.operation = "renta".to_string();
            }
        }
        if let Some(price) = first_text(&container, &[".price-value span"], 1) {
            rec.price = price;
        }
        if let Some(expenses) = first_text(&container, &[".price-extra .price-expenses"], 1) {
            rec.maintenance = expenses;
        }
    }

    fn parse_location(rec: &mut DetailRecord, root: &ElementRef) {
        let Ok(section_sel) = Selector::parse(".section-location-property") else {
            return;
        };
        let Some(section) = root.select(&section_sel).next() else {
            return;
        };
        if let Some(address) = first_text(&section, &["h4"], 1) {
            rec.location = address;
        }
        if let Some(href) = first_attr(
            &section,
            &["a[href*='maps']", "a[href*='ubicacion']", "a[href*='mapa']"],
            "href",
        ) {
            rec.location_url = href;
        }
    }

    /// Icon-feature grid; the <i> class names which field the row feeds.
    fn parse_icon_features(rec: &mut DetailRecord, root: &ElementRef) {
        let Ok(li_sel) = Selector::parse("#section-icon-features-property li.icon-feature")
        else {
            return;
        };
        let Ok(i_sel) = Selector::parse("i") else {
            return;
        };
        for li in root.select(&li_sel) {
            let Some(icon) = li.select(&i_sel).next() else {
                continue;
            };
            let classes = icon.value().attr("class").unwrap_or_default();
            let text = collapse_ws(&li.text().collect::<String>());
            if text.is_empty() {
                continue;
            }
            if classes.contains("icon-stotal") {
                rec.total_area = text;
            } else if classes.contains("icon-scubierta") {
                rec.covered_area = text;
            } else if classes.contains("icon-mediobano") || classes.contains("medio-bano") {
                rec.half_bathrooms = text;
            } else if classes.contains("icon-bano") {
                rec.bathrooms = text;
            } else if classes.contains("icon-cochera") {
                rec.parking = text;
            } else if classes.contains("icon-dormitorio") {
                rec.bedrooms = text;
            } else if classes.contains("icon-antiguedad") || classes.contains("antiguedad") {
                rec.age = text;
            }
        }
    }

    fn parse_publisher_codes(rec: &mut DetailRecord, root: &ElementRef) {
        let Ok(li_sel) = Selector::parse("#reactPublisherCodes li") else {
            return;
        };
        for li in root.select(&li_sel) {
            let text = collapse_ws(&li.text().collect::<String>());
            if let Some((label, value)) = text.split_once(':') {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if label.contains("Cód. del anunciante") {
                    rec.advertiser_code = value.to_string();
                } else if label.contains("Cód. Inmuebles24") {
                    rec.site_code = value.to_string();
                }
            }
        }
    }

    fn parse_phone(rec: &mut DetailRecord, root: &ElementRef) {
        for raw in PHONE_SELECTORS {
            let Ok(sel) = Selector::parse(raw) else {
                continue;
            };
            let Some(el) = root.select(&sel).next() else {
                continue;
            };
            let text = collapse_ws(&el.text().collect::<String>());
            let candidate = if text.is_empty() {
                el.value().attr("href").unwrap_or_default().to_string()
            } else {
                text
            };
            if candidate.contains("tel:") || candidate.chars().any(|c| c.is_ascii_digit()) {
                rec.phone = candidate.replace("tel:", "");
                return;
            }
        }
    }

    fn parse_general_features(rec: &mut DetailRecord, root: &ElementRef) {
        let Ok(span_sel) = Selector::parse("#reactGeneralFeatures span") else {
            return;
        };
        let features: Vec<String> = root
            .select(&span_sel)
            .map(|el| collapse_ws(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if !features.is_empty() {
            rec.features = features.join(" | ");
        }
    }
}

fn first_digits(text: &str) -> Option<String> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (!digits.is_empty()).then_some(digits)
}

impl DetailScraper for Inmuebles24DetailScraper {
    fn site(&self) -> Site {
        Site::Inmuebles24
    }

    fn parse_detail_page(&self, html: &str, url: &str) -> Option<DetailRecord> {
        let doc = Html::parse_document(html);
        if Self::is_sponsored(&doc) {
            return self.parse_sponsored(&doc, url);
        }

        let root = doc.root_element();
        let mut rec = DetailRecord::empty(url, self.operation);

        rec.title = or_sentinel(first_text(&root, &["h1.title-property"], 1), DETAIL_SENTINEL);
        Self::parse_subtitle(&mut rec, &root);
        Self::parse_price(&mut rec, &root);
        Self::parse_location(&mut rec, &root);
        rec.description = or_sentinel(
            first_text(
                &root,
                &["section.article-section-description #longDescription"],
                1,
            ),
            DETAIL_SENTINEL,
        );
        if let Some(advertiser) = first_text(&root, &["[data-qa='linkMicrositioAnunciante']"], 1) {
            rec.advertiser = advertiser;
        }
        Self::parse_phone(&mut rec, &root);
        Self::parse_publisher_codes(&mut rec, &root);
        rec.published_age = or_sentinel(first_text(&root, &["#user-views p"], 1), DETAIL_SENTINEL);
        Self::parse_icon_features(&mut rec, &root);
        Self::parse_general_features(&mut rec, &root);

        rec.has_substance().then_some(rec)
    }
}
