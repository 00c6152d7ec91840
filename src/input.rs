//! URL-file loading. The upstream CSVs are hand-assembled and the URL column
//! name varies, so a small cascade of candidate headers is tried before
//! falling back to the first column.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

const URL_COLUMNS: [&str; 4] = ["url", "link", "URL", "Link"];

/// Load property URLs from a CSV (url/link column) or a plain text file
/// (one URL per line). Values not starting with `http` are dropped.
pub fn load_urls(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        anyhow::bail!("URLs file not found: {}", path.display());
    }
    let urls = if path.extension().is_some_and(|e| e == "csv") {
        load_from_csv(path)?
    } else {
        load_from_text(path)?
    };
    info!("Loaded {} URLs from {}", urls.len(), path.display());
    if urls.is_empty() {
        warn!("No valid URLs found in {}", path.display());
    }
    Ok(urls)
}

fn load_from_csv(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let url_idx = URL_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        // Hand-assembled files sometimes have the URLs as the only column,
        // headerless naming aside.
        .unwrap_or(0);

    let mut urls = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping malformed CSV row: {e}");
                continue;
            }
        };
        if let Some(value) = row.get(url_idx) {
            let value = value.trim();
            if value.starts_with("http") {
                urls.push(value.to_string());
            }
        }
    }
    Ok(urls)
}

fn load_from_text(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("http"))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp(name: &str, ext: &str, content: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        let path = std::env::temp_dir().join(format!(
            "inmo-scout-{name}-{}-{nanos}.{ext}",
            std::process::id()
        ));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn finds_lowercase_url_column() {
        let path = write_temp("urls-lower", "csv", "id,url\n1,https://a.mx/1\n2,https://a.mx/2\n");
        let urls = load_urls(&path).unwrap();
        assert_eq!(urls, vec!["https://a.mx/1", "https://a.mx/2"]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn falls_back_through_link_and_uppercase_variants() {
        let path = write_temp("urls-link", "csv", "Link,extra\nhttps://b.mx/9,x\n");
        assert_eq!(load_urls(&path).unwrap(), vec!["https://b.mx/9"]);
        let _ = fs::remove_file(path);

        let path = write_temp("urls-upper", "csv", "URL\nhttps://c.mx/3\nnot-a-url\n");
        assert_eq!(load_urls(&path).unwrap(), vec!["https://c.mx/3"]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn plain_text_file_one_url_per_line() {
        let path = write_temp("urls-txt", "txt", "https://d.mx/1\n\n# comment\nhttps://d.mx/2\n");
        assert_eq!(load_urls(&path).unwrap(), vec!["https://d.mx/1", "https://d.mx/2"]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_errors() {
        assert!(load_urls(Path::new("/definitely/not/here.csv")).is_err());
    }
}
