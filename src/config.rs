use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Portal being scraped. Each variant maps to one parser module under
/// `scrapers/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Inmuebles24,
    CasasYTerrenos,
    Lamudi,
    Mitula,
    Trovit,
    Propiedades,
}

impl Site {
    /// Short slug used in file and directory names.
    pub fn slug(&self) -> &'static str {
        match self {
            Site::Inmuebles24 => "inm24",
            Site::CasasYTerrenos => "cyt",
            Site::Lamudi => "lam",
            Site::Mitula => "mit",
            Site::Trovit => "tro",
            Site::Propiedades => "prop",
        }
    }

    /// Base URL for resolving relative hrefs found on cards.
    pub fn base_url(&self) -> &'static str {
        match self {
            Site::Inmuebles24 => "https://www.inmuebles24.com",
            Site::CasasYTerrenos => "https://www.casasyterrenos.com",
            Site::Lamudi => "https://www.lamudi.com.mx",
            Site::Mitula => "https://www.mitula.mx",
            Site::Trovit => "https://casas.trovit.com.mx",
            Site::Propiedades => "https://propiedades.com",
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// venta/renta. The value is written verbatim into the `operation` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    #[default]
    Venta,
    Renta,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Venta => "venta",
            OperationType::Renta => "renta",
        }
    }

    /// Three-letter folder code used by the detail output layout.
    pub fn short_code(&self) -> &'static str {
        match self {
            OperationType::Venta => "ven",
            OperationType::Renta => "ren",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run needs, passed explicitly to each component instead of
/// module-level constants.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub site: Site,
    pub operation: OperationType,
    pub headless: bool,
    /// Maximum units (pages or detail URLs) to process this run.
    pub limit: Option<usize>,
    /// Start index override; `None` means consult the checkpoint.
    pub resume_from: Option<usize>,
    pub failure_threshold: u32,
    pub checkpoint_interval: usize,
    /// Randomized sleep between units, inclusive bounds in seconds.
    pub delay_secs: (u64, u64),
    pub page_timeout_secs: u64,
    /// Save an HTML snapshot when a challenge page is detected.
    pub snapshots: bool,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub output_file: Option<String>,
}

impl ScrapeConfig {
    pub fn new(site: Site, operation: OperationType) -> Self {
        Self {
            site,
            operation,
            headless: true,
            limit: None,
            resume_from: None,
            failure_threshold: 10,
            checkpoint_interval: 25,
            delay_secs: (2, 5),
            page_timeout_secs: 30,
            snapshots: false,
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            output_file: None,
        }
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.logs_dir.join("checkpoints")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir().join(format!(
            "{}_{}_checkpoint.json",
            self.site.slug(),
            self.operation.as_str()
        ))
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.logs_dir.join("snapshots")
    }

    /// Detail runs write under `data/<site>/<ven|ren>/`.
    pub fn detail_root(&self) -> PathBuf {
        self.data_dir
            .join(self.site.slug())
            .join(self.operation.short_code())
    }
}
