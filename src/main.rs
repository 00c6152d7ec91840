use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inmo_scout::config::{OperationType, ScrapeConfig, Site};
use inmo_scout::fetch::{BrowserFetcher, HttpFetcher, PageFetcher};
use inmo_scout::input::load_urls;
use inmo_scout::runner::{run_details, run_listings};

/// Scraper for Mexican real-estate portals.
#[derive(Debug, Parser)]
#[command(name = "inmo-scout", version, about)]
struct Cli {
    /// Portal to scrape.
    #[arg(value_enum)]
    site: Site,

    /// Single URL to scrape.
    #[arg(long, conflicts_with = "urls_file")]
    url: Option<String>,

    /// CSV or text file with one URL per row.
    #[arg(long)]
    urls_file: Option<PathBuf>,

    /// venta or renta; written into every output row.
    #[arg(long, value_enum, default_value_t = OperationType::Venta)]
    operation: OperationType,

    /// Scrape individual property pages instead of search results.
    #[arg(long)]
    details: bool,

    /// Run Chrome with a visible window.
    #[arg(long)]
    gui: bool,

    /// Maximum units (pages or property URLs) to process.
    #[arg(long, visible_aliases = ["pages", "properties"])]
    limit: Option<usize>,

    /// Start at this unit index, overriding any checkpoint.
    #[arg(long)]
    resume: Option<usize>,

    /// Root directory for CSV output.
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,

    /// Output CSV filename, overriding the per-site default.
    #[arg(long)]
    output_file: Option<String>,

    /// Stop after this many consecutive units without data.
    #[arg(long, default_value_t = 10)]
    failure_threshold: u32,

    /// Persist progress every N units; 0 disables periodic checkpoints.
    #[arg(long, default_value_t = 25)]
    checkpoint_interval: usize,

    /// Minimum pause between units, seconds.
    #[arg(long, default_value_t = 2)]
    delay_min: u64,

    /// Maximum pause between units, seconds.
    #[arg(long, default_value_t = 5)]
    delay_max: u64,

    /// Fetch over plain HTTP instead of a browser.
    #[arg(long)]
    http_fallback: bool,

    /// Save HTML snapshots of challenge pages under logs/snapshots.
    #[arg(long)]
    snapshots: bool,
}

impl Cli {
    fn into_config(self) -> (ScrapeConfig, Option<String>, Option<PathBuf>, bool, bool) {
        let mut cfg = ScrapeConfig::new(self.site, self.operation);
        cfg.headless = !self.gui;
        cfg.limit = self.limit;
        cfg.resume_from = self.resume;
        cfg.failure_threshold = self.failure_threshold;
        cfg.checkpoint_interval = self.checkpoint_interval;
        cfg.delay_secs = (self.delay_min, self.delay_max);
        cfg.snapshots = self.snapshots;
        cfg.data_dir = self.output_dir;
        cfg.output_file = self.output_file;
        (cfg, self.url, self.urls_file, self.details, self.http_fallback)
    }
}

/// Default URL file for a site: `URLs/<slug>_urls.csv`.
fn default_urls_file(site: Site) -> PathBuf {
    PathBuf::from("URLs").join(format!("{}_urls.csv", site.slug()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let (cfg, single_url, urls_file, details, http_fallback) = cli.into_config();

    info!("🏠 inmo-scout: {} ({})", cfg.site, cfg.operation);
    info!("==========================================");

    let urls = match single_url {
        Some(url) => vec![url],
        None => {
            let path = urls_file.unwrap_or_else(|| default_urls_file(cfg.site));
            load_urls(&path)?
        }
    };
    if urls.is_empty() {
        anyhow::bail!("no URLs to process");
    }

    // Ctrl-C flips the flag; the loop checkpoints and exits at the next
    // unit boundary.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, finishing current unit...");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let fetcher: Box<dyn PageFetcher> = if http_fallback {
        info!("Using plain HTTP fetcher");
        Box::new(HttpFetcher::new(cfg.site.base_url(), cfg.page_timeout_secs)?)
    } else {
        Box::new(BrowserFetcher::new(cfg.headless, cfg.page_timeout_secs)?)
    };

    let report = if details {
        run_details(&cfg, fetcher.as_ref(), &urls, &stop).await?
    } else {
        run_listings(&cfg, fetcher.as_ref(), &urls, &stop).await?
    };

    info!(
        "✅ {} units processed, {} records extracted in {:.1}s",
        report.units_processed, report.records_extracted, report.duration_secs
    );
    if report.stopped_early {
        warn!("Run stopped early after repeated units without data");
    }

    // A single-URL probe that produced nothing is a failure.
    if urls.len() == 1 && report.records_extracted == 0 {
        anyhow::bail!("no data extracted from {}", urls[0]);
    }

    Ok(())
}
