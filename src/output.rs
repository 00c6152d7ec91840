//! CSV output and run reports.
//!
//! The writer merges with whatever already exists at the target path: old
//! rows are read back, new rows appended after them, and the union written
//! out. No deduplication happens here; downstream consumers own that.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::ScrapeConfig;
use crate::models::RunReport;

/// Spanish month abbreviations used by the detail output folders (ene26,
/// ago25, ...).
const MONTH_ABBREV: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// Append `new_rows` to the CSV at `path`, keeping any existing rows first
/// and in their original order. Returns the total row count after the write.
pub fn merge_append<T>(path: &Path, new_rows: &[T]) -> Result<usize>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut rows: Vec<T> = Vec::new();
    if path.exists() {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("reading existing {}", path.display()))?;
        for row in reader.deserialize() {
            rows.push(row.with_context(|| format!("parsing existing row in {}", path.display()))?);
        }
    }
    rows.extend_from_slice(new_rows);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output dir {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("writing {}", path.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Listing output path: `data/<YYYY-MM-DD>/<site>-data.csv`.
pub fn listing_path(cfg: &ScrapeConfig) -> PathBuf {
    let day_dir = cfg.data_dir.join(Utc::now().date_naive().to_string());
    match &cfg.output_file {
        Some(name) => day_dir.join(name),
        None => day_dir.join(format!("{}-data.csv", cfg.site.slug())),
    }
}

/// `monYY` folder name for a date, e.g. `ago25` for August 2025.
pub fn month_folder(date: NaiveDate) -> String {
    format!(
        "{}{:02}",
        MONTH_ABBREV[date.month0() as usize],
        date.year() % 100
    )
}

/// First run of the month goes to `.../1/`, a later run to `.../2/`. The
/// marker is whether folder `1` already holds a CSV.
pub fn run_number(month_dir: &Path) -> u32 {
    let first = month_dir.join("1");
    let has_csv = fs::read_dir(&first)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
        })
        .unwrap_or(false);
    if has_csv {
        2
    } else {
        1
    }
}

/// Detail output directory + CSV path:
/// `data/<site>/<ven|ren>/<monYY>/<run>/<site>_<monYY>_<run>.csv`.
pub fn detail_paths(cfg: &ScrapeConfig) -> (PathBuf, PathBuf) {
    let month = month_folder(Utc::now().date_naive());
    let month_dir = cfg.detail_root().join(&month);
    let run = run_number(&month_dir);
    let run_dir = month_dir.join(run.to_string());
    let csv = match &cfg.output_file {
        Some(name) => run_dir.join(name),
        None => run_dir.join(format!("{}_{}_{}.csv", cfg.site.slug(), month, run)),
    };
    (run_dir, csv)
}

/// Serialize the run report as JSON next to the CSV output.
pub fn write_report(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("metadata_{stamp}.json"));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("Run report written to {}", path.display());
    Ok(path)
}

/// Persist a page body for offline inspection of blocked or empty pages.
pub fn save_snapshot(dir: &Path, site_slug: &str, unit_index: usize, html: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{site_slug}_unit{unit_index}_{stamp}.html"));
    fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
