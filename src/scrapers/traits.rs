use crate::config::Site;
use crate::models::{DetailRecord, ListingRecord};

/// Parser for one portal's search-results markup.
///
/// Implementations are pure HTML-in/records-out so new portals can be added
/// without touching the fetch or orchestration layers.
pub trait SiteScraper: Send + Sync {
    fn site(&self) -> Site;

    /// Parse every property card on a results page into flat records.
    /// An unrecognized page yields an empty vec, never an error.
    fn parse_listing_page(&self, html: &str) -> Vec<ListingRecord>;
}

/// Parser for one portal's individual property pages (detail phase).
pub trait DetailScraper: Send + Sync {
    fn site(&self) -> Site;

    /// `None` means the page held no usable property data at all; partial
    /// extractions come back sentinel-filled instead.
    fn parse_detail_page(&self, html: &str, url: &str) -> Option<DetailRecord>;
}
