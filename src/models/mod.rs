use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{OperationType, Site};

/// Sentinel written for a listing field no resolver matched.
pub const LISTING_SENTINEL: &str = "null";

/// Sentinel used by the detail-page records.
pub const DETAIL_SENTINEL: &str = "N/A";

/// One row per property card on a search-results page.
///
/// Every field is free text exactly as it appeared on the card; counts are
/// not normalized to numerics. A field that could not be extracted holds
/// [`LISTING_SENTINEL`] so the output schema stays stable across partial
/// failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub description: String,
    pub location: String,
    pub url: String,
    pub price: String,
    pub operation: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking: String,
    pub area: String,
    pub code: String,
}

impl ListingRecord {
    /// Sentinel-filled record with the operation column preset.
    pub fn empty(operation: OperationType) -> Self {
        Self {
            title: LISTING_SENTINEL.into(),
            description: LISTING_SENTINEL.into(),
            location: LISTING_SENTINEL.into(),
            url: LISTING_SENTINEL.into(),
            price: LISTING_SENTINEL.into(),
            operation: operation.as_str().into(),
            bedrooms: LISTING_SENTINEL.into(),
            bathrooms: LISTING_SENTINEL.into(),
            parking: LISTING_SENTINEL.into(),
            area: LISTING_SENTINEL.into(),
            code: LISTING_SENTINEL.into(),
        }
    }

    /// A card that produced neither a URL nor a title is noise, not data.
    pub fn has_substance(&self) -> bool {
        self.url != LISTING_SENTINEL || self.title != LISTING_SENTINEL
    }
}

/// One row per individual property page; superset of the card fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub url: String,
    pub title: String,
    pub price: String,
    pub location: String,
    pub location_url: String,
    pub property_type: String,
    pub total_area: String,
    pub covered_area: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub half_bathrooms: String,
    pub parking: String,
    pub age: String,
    pub features: String,
    pub description: String,
    pub advertiser: String,
    pub phone: String,
    pub operation: String,
    pub maintenance: String,
    pub advertiser_code: String,
    pub site_code: String,
    pub published_age: String,
    pub sponsored: bool,
    pub scraped_at: DateTime<Utc>,
}

impl DetailRecord {
    pub fn empty(url: &str, operation: OperationType) -> Self {
        let na = || DETAIL_SENTINEL.to_string();
        Self {
            url: url.to_string(),
            title: na(),
            price: na(),
            location: na(),
            location_url: na(),
            property_type: na(),
            total_area: na(),
            covered_area: na(),
            bedrooms: na(),
            bathrooms: na(),
            half_bathrooms: na(),
            parking: na(),
            age: na(),
            features: na(),
            description: na(),
            advertiser: na(),
            phone: na(),
            operation: operation.as_str().into(),
            maintenance: na(),
            advertiser_code: na(),
            site_code: na(),
            published_age: na(),
            sponsored: false,
            scraped_at: Utc::now(),
        }
    }

    /// Extraction counts as successful when at least title or price came out.
    pub fn has_substance(&self) -> bool {
        self.title != DETAIL_SENTINEL || self.price != DETAIL_SENTINEL
    }
}

/// What went wrong with a unit, for the run-report histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueKind {
    FetchTimeout,
    Navigation,
    ChallengeDetected,
    EmptyPage,
    Io,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::FetchTimeout => "fetch_timeout",
            IssueKind::Navigation => "navigation",
            IssueKind::ChallengeDetected => "challenge_detected",
            IssueKind::EmptyPage => "empty_page",
            IssueKind::Io => "io",
        }
    }
}

/// Aggregate counters for one run, written as JSON next to the CSV output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub site: Site,
    pub operation: OperationType,
    pub units_processed: u64,
    pub records_extracted: u64,
    pub successes: u64,
    pub failures: u64,
    pub stopped_early: bool,
    pub interrupted: bool,
    pub issues: BTreeMap<String, u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

impl RunReport {
    pub fn new(site: Site, operation: OperationType) -> Self {
        Self {
            site,
            operation,
            units_processed: 0,
            records_extracted: 0,
            successes: 0,
            failures: 0,
            stopped_early: false,
            interrupted: false,
            issues: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: 0.0,
        }
    }

    pub fn record_issue(&mut self, kind: IssueKind) {
        *self.issues.entry(kind.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration_secs = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_is_all_sentinels_except_operation() {
        let rec = ListingRecord::empty(OperationType::Renta);
        assert_eq!(rec.title, LISTING_SENTINEL);
        assert_eq!(rec.price, LISTING_SENTINEL);
        assert_eq!(rec.operation, "renta");
        assert!(!rec.has_substance());
    }

    #[test]
    fn issue_histogram_accumulates() {
        let mut report = RunReport::new(Site::Mitula, OperationType::Venta);
        report.record_issue(IssueKind::EmptyPage);
        report.record_issue(IssueKind::EmptyPage);
        report.record_issue(IssueKind::Navigation);
        assert_eq!(report.issues["empty_page"], 2);
        assert_eq!(report.issues["navigation"], 1);
    }
}
