//! The scrape loop: fetch each unit (a results page or a property URL),
//! parse it, buffer rows, and keep the checkpoint and run report current.
//!
//! The loop is generic over the record type and parser so listing runs and
//! detail runs share one implementation, and so tests can drive it with a
//! stub fetcher.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::ScrapeConfig;
use crate::fetch::{detect_challenge, FetchError, FetchedPage, PageFetcher};
use crate::models::{IssueKind, RunReport};
use crate::output::{detail_paths, listing_path, merge_append, save_snapshot, write_report};
use crate::scrapers::{detail_scraper_for, scraper_for};

/// Rows are flushed to disk together with each checkpoint save, so a killed
/// run loses at most one interval of extractions.
pub async fn run_units<T, F>(
    cfg: &ScrapeConfig,
    fetcher: &dyn PageFetcher,
    units: &[String],
    parse: F,
    out_csv: &Path,
    stop: &AtomicBool,
) -> Result<RunReport>
where
    T: Serialize + DeserializeOwned + Clone,
    F: Fn(&FetchedPage, &str) -> Vec<T>,
{
    let store = CheckpointStore::new(cfg.checkpoint_path());
    let mut report = RunReport::new(cfg.site, cfg.operation);

    let mut processed: u64 = 0;
    let mut succeeded: u64 = 0;
    let start = match cfg.resume_from {
        Some(index) => index,
        None => match store.load() {
            Some(cp) => {
                processed = cp.processed;
                succeeded = cp.succeeded;
                cp.last_index
            }
            None => 0,
        },
    };
    if start >= units.len() {
        info!("Nothing to do: start index {start} >= {} units", units.len());
        store.clear();
        report.finish();
        return Ok(report);
    }

    let end = match cfg.limit {
        Some(limit) => units.len().min(start + limit),
        None => units.len(),
    };
    info!(
        "🚀 Processing units {start}..{end} of {} for {} ({})",
        units.len(),
        cfg.site,
        cfg.operation
    );

    let mut pending: Vec<T> = Vec::new();
    let mut consecutive_failures: u32 = 0;
    let mut interrupted = false;

    for (offset, unit) in units[start..end].iter().enumerate() {
        let index = start + offset;

        if stop.load(Ordering::Relaxed) {
            warn!("Interrupt received, checkpointing at index {index}");
            store.save(&Checkpoint::new(index, processed, succeeded, cfg.operation))?;
            interrupted = true;
            break;
        }

        info!("[{}/{}] {unit}", index + 1, units.len());
        let mut extracted = 0usize;
        match fetcher.fetch(unit).await {
            Err(FetchError::Timeout { url }) => {
                warn!("⏱️ Timeout loading {url}");
                report.record_issue(IssueKind::FetchTimeout);
            }
            Err(FetchError::Navigation { url, reason }) => {
                warn!("Navigation failed for {url}: {reason}");
                report.record_issue(IssueKind::Navigation);
            }
            Ok(page) => {
                if let Some(marker) = detect_challenge(&page.html) {
                    warn!("🛡️ Challenge page detected ({marker}) at {}", page.final_url);
                    report.record_issue(IssueKind::ChallengeDetected);
                    if cfg.snapshots {
                        if let Err(e) =
                            save_snapshot(&cfg.snapshot_dir(), cfg.site.slug(), index, &page.html)
                        {
                            warn!("Failed to save snapshot: {e}");
                            report.record_issue(IssueKind::Io);
                        }
                    }
                } else {
                    let records = parse(&page, unit.as_str());
                    extracted = records.len();
                    if records.is_empty() {
                        report.record_issue(IssueKind::EmptyPage);
                    } else {
                        pending.extend(records);
                    }
                }
            }
        }

        processed += 1;
        report.units_processed += 1;
        if extracted > 0 {
            succeeded += 1;
            report.successes += 1;
            report.records_extracted += extracted as u64;
            consecutive_failures = 0;
            info!("✅ {extracted} records from unit {}", index + 1);
        } else {
            report.failures += 1;
            consecutive_failures += 1;
        }

        if consecutive_failures >= cfg.failure_threshold {
            warn!(
                "🛑 {} consecutive units without data, stopping early",
                consecutive_failures
            );
            report.stopped_early = true;
            break;
        }

        // Periodic persistence: next index first, then the rows backing it.
        // An interval of 0 disables this; rows still land in the final flush.
        if cfg.checkpoint_interval > 0 && (index + 1 - start) % cfg.checkpoint_interval == 0 {
            store.save(&Checkpoint::new(index + 1, processed, succeeded, cfg.operation))?;
            if !pending.is_empty() {
                merge_append(out_csv, &pending)?;
                pending.clear();
            }
        }

        if index + 1 < end {
            jitter_sleep(cfg.delay_secs).await;
        }
    }

    if !pending.is_empty() {
        merge_append(out_csv, &pending)?;
    }

    report.interrupted = interrupted;
    report.finish();
    if !interrupted {
        store.clear();
    }
    info!(
        "🏁 Run finished: {} units, {} records, {} failures",
        report.units_processed, report.records_extracted, report.failures
    );
    Ok(report)
}

/// Random pause between units, inclusive bounds in seconds.
async fn jitter_sleep(bounds: (u64, u64)) {
    let (min, max) = bounds;
    if max == 0 {
        return;
    }
    let secs = if min >= max {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    };
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

/// Listing run: each unit is a search-results page.
pub async fn run_listings(
    cfg: &ScrapeConfig,
    fetcher: &dyn PageFetcher,
    urls: &[String],
    stop: &AtomicBool,
) -> Result<RunReport> {
    let scraper = scraper_for(cfg.site, cfg.operation);
    let csv = listing_path(cfg);
    let report = run_units(
        cfg,
        fetcher,
        urls,
        |page: &FetchedPage, _unit: &str| scraper.parse_listing_page(&page.html),
        &csv,
        stop,
    )
    .await?;

    if let Some(dir) = csv.parent() {
        write_report(dir, &report)?;
    }
    Ok(report)
}

/// Detail run: each unit is one property URL yielding at most one row.
pub async fn run_details(
    cfg: &ScrapeConfig,
    fetcher: &dyn PageFetcher,
    urls: &[String],
    stop: &AtomicBool,
) -> Result<RunReport> {
    let Some(scraper) = detail_scraper_for(cfg.site, cfg.operation) else {
        bail!("{} has no detail-page scraper", cfg.site);
    };
    let (run_dir, csv) = detail_paths(cfg);
    let report = run_units(
        cfg,
        fetcher,
        urls,
        |page: &FetchedPage, unit: &str| {
            scraper
                .parse_detail_page(&page.html, unit)
                .into_iter()
                .collect()
        },
        &csv,
        stop,
    )
    .await?;

    write_report(&run_dir, &report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OperationType, ScrapeConfig, Site};
    use crate::models::ListingRecord;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct StubFetcher {
        calls: AtomicUsize,
        html: String,
    }

    impl StubFetcher {
        fn new() -> Self {
            Self::with_html("<html><body></body></html>")
        }

        fn with_html(html: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                html: html.to_string(),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedPage {
                html: self.html.clone(),
                final_url: url.to_string(),
            })
        }
    }

    fn test_cfg(tag: &str) -> ScrapeConfig {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        let root = std::env::temp_dir().join(format!(
            "inmo-scout-runner-{tag}-{}-{nanos}",
            std::process::id()
        ));
        let mut cfg = ScrapeConfig::new(Site::Mitula, OperationType::Venta);
        cfg.data_dir = root.join("data");
        cfg.logs_dir = root.join("logs");
        cfg.delay_secs = (0, 0);
        cfg
    }

    fn units(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://example.mx/p/{i}")).collect()
    }

    fn csv_path(cfg: &ScrapeConfig) -> PathBuf {
        cfg.data_dir.join("out.csv")
    }

    #[tokio::test]
    async fn stops_after_exactly_threshold_empty_units() {
        let mut cfg = test_cfg("threshold");
        cfg.failure_threshold = 4;
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);

        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(50),
            |_, _| Vec::new(),
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        assert_eq!(report.units_processed, 4);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert!(report.stopped_early);
        assert_eq!(report.issues["empty_page"], 4);
        // Early stop still counts as a completed run.
        assert!(!cfg.checkpoint_path().exists());
    }

    #[tokio::test]
    async fn successes_reset_the_failure_streak() {
        let mut cfg = test_cfg("streak");
        cfg.failure_threshold = 3;
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);

        // Fails twice, succeeds, then fails three more: 6 units total.
        let pattern = [false, false, true, false, false, false];
        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(20),
            |_, unit| {
                let i: usize = unit.rsplit('/').next().unwrap().parse().unwrap();
                if pattern[i] {
                    vec![ListingRecord::empty(OperationType::Venta)]
                } else {
                    Vec::new()
                }
            },
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        assert_eq!(report.units_processed, 6);
        assert_eq!(report.successes, 1);
        assert!(report.stopped_early);
    }

    #[tokio::test]
    async fn resume_override_starts_at_exact_index() {
        let mut cfg = test_cfg("resume");
        cfg.resume_from = Some(3);
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);

        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(5),
            |_, _| vec![ListingRecord::empty(OperationType::Venta)],
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        // Units 3 and 4 only.
        assert_eq!(report.units_processed, 2);
        assert_eq!(report.records_extracted, 2);
    }

    #[tokio::test]
    async fn checkpoint_resume_continues_where_it_left_off() {
        let cfg = test_cfg("checkpoint");
        let store = CheckpointStore::new(cfg.checkpoint_path());
        store
            .save(&Checkpoint::new(7, 7, 5, OperationType::Venta))
            .unwrap();

        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);
        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(10),
            |_, _| vec![ListingRecord::empty(OperationType::Venta)],
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        // This run touches units 7, 8, 9 exactly.
        assert_eq!(report.units_processed, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert!(!cfg.checkpoint_path().exists());
    }

    #[tokio::test]
    async fn interrupt_saves_checkpoint_and_keeps_it() {
        let cfg = test_cfg("interrupt");
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(true);

        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(10),
            |_, _| vec![ListingRecord::empty(OperationType::Venta)],
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.units_processed, 0);
        let cp = CheckpointStore::new(cfg.checkpoint_path())
            .load()
            .expect("checkpoint should survive an interrupt");
        assert_eq!(cp.last_index, 0);
    }

    #[tokio::test]
    async fn limit_caps_units_this_run() {
        let mut cfg = test_cfg("limit");
        cfg.limit = Some(2);
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);

        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(10),
            |_, _| vec![ListingRecord::empty(OperationType::Venta)],
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        assert_eq!(report.units_processed, 2);
        assert_eq!(report.records_extracted, 2);
    }

    #[tokio::test]
    async fn zero_checkpoint_interval_disables_periodic_saves() {
        let mut cfg = test_cfg("interval0");
        cfg.checkpoint_interval = 0;
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);
        let csv = csv_path(&cfg);

        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(3),
            |_, _| vec![ListingRecord::empty(OperationType::Venta)],
            &csv,
            &stop,
        )
        .await
        .unwrap();

        assert_eq!(report.units_processed, 3);
        assert!(!cfg.checkpoint_path().exists());
        // Rows still arrive through the final flush.
        let mut reader = csv::Reader::from_path(&csv).unwrap();
        assert_eq!(reader.deserialize::<ListingRecord>().count(), 3);
    }

    #[tokio::test]
    async fn snapshot_write_failure_is_counted_as_io() {
        let mut cfg = test_cfg("snapio");
        cfg.snapshots = true;
        // A file where the logs directory should be makes every snapshot
        // write fail.
        std::fs::create_dir_all(cfg.logs_dir.parent().unwrap()).unwrap();
        std::fs::write(&cfg.logs_dir, b"not a directory").unwrap();

        let fetcher =
            StubFetcher::with_html("<html><body>Just a moment...</body></html>");
        let stop = AtomicBool::new(false);

        let report = run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(1),
            |_, _| vec![ListingRecord::empty(OperationType::Venta)],
            &csv_path(&cfg),
            &stop,
        )
        .await
        .unwrap();

        assert_eq!(report.issues["challenge_detected"], 1);
        assert_eq!(report.issues["io"], 1);
    }

    #[tokio::test]
    async fn extracted_rows_reach_the_csv() {
        let cfg = test_cfg("rows");
        let fetcher = StubFetcher::new();
        let stop = AtomicBool::new(false);
        let csv = csv_path(&cfg);

        run_units::<ListingRecord, _>(
            &cfg,
            &fetcher,
            &units(3),
            |_, unit| {
                let mut rec = ListingRecord::empty(OperationType::Venta);
                rec.url = unit.to_string();
                vec![rec]
            },
            &csv,
            &stop,
        )
        .await
        .unwrap();

        let mut reader = csv::Reader::from_path(&csv).unwrap();
        let rows: Vec<ListingRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].url, "https://example.mx/p/0");
    }
}
