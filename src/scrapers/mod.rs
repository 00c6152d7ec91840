pub mod casasyterrenos;
pub mod inmuebles24;
pub mod lamudi;
pub mod mitula;
pub mod propiedades;
pub mod traits;
pub mod trovit;

pub use traits::{DetailScraper, SiteScraper};

use crate::config::{OperationType, Site};

/// Listing-page parser for a portal.
pub fn scraper_for(site: Site, operation: OperationType) -> Box<dyn SiteScraper> {
    match site {
        Site::Inmuebles24 => Box::new(inmuebles24::Inmuebles24Scraper::new(operation)),
        Site::CasasYTerrenos => Box::new(casasyterrenos::CasasYTerrenosScraper::new(operation)),
        Site::Lamudi => Box::new(lamudi::LamudiScraper::new(operation)),
        Site::Mitula => Box::new(mitula::MitulaScraper::new(operation)),
        Site::Trovit => Box::new(trovit::TrovitScraper::new(operation)),
        Site::Propiedades => Box::new(propiedades::PropiedadesScraper::new(operation)),
    }
}

/// Detail-page parser, for the portals that have one.
pub fn detail_scraper_for(site: Site, operation: OperationType) -> Option<Box<dyn DetailScraper>> {
    match site {
        Site::Inmuebles24 => Some(Box::new(inmuebles24::Inmuebles24DetailScraper::new(operation))),
        Site::Lamudi => Some(Box::new(lamudi::LamudiDetailScraper::new(operation))),
        _ => None,
    }
}
