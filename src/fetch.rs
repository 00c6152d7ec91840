//! Page fetching: a headless-Chrome fetcher plus a plain-HTTP fallback for
//! pages that load without JavaScript. Both sit behind [`PageFetcher`] so the
//! orchestration loop can be driven by stubs in tests.

use std::ffi::OsStr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use tracing::{debug, info, warn};

/// Realistic desktop user agents; one is picked per session.
const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

/// Keywords that mark a Cloudflare challenge or CAPTCHA interstitial.
const CHALLENGE_MARKERS: [&str; 8] = [
    "checking your browser",
    "just a moment",
    "challenge-form",
    "turnstile",
    "cf-browser-verification",
    "cf-checking-browser",
    "captcha",
    "access denied",
];

/// Raw page plus the final (possibly redirected) URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub final_url: String,
}

/// Typed failure at the fetcher seam. Everything else in the pipeline uses
/// `anyhow`, but the loop needs to tell a timeout from a navigation error
/// for the issue histogram.
#[derive(Debug)]
pub enum FetchError {
    Timeout { url: String },
    Navigation { url: String, reason: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout { url } => write!(f, "timed out loading {url}"),
            FetchError::Navigation { url, reason } => {
                write!(f, "navigation failed for {url}: {reason}")
            }
        }
    }
}

impl std::error::Error for FetchError {}

/// Scan a page for challenge markers; returns the first one found.
pub fn detect_challenge(html: &str) -> Option<&'static str> {
    let lower = html.to_lowercase();
    CHALLENGE_MARKERS.iter().find(|m| lower.contains(*m)).copied()
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Headless-Chrome session owned exclusively by one scrape loop.
pub struct BrowserFetcher {
    browser: Browser,
    user_agent: &'static str,
    page_timeout: Duration,
    /// Extra settle time after navigation; some portals hydrate cards late.
    settle: Duration,
}

impl BrowserFetcher {
    pub fn new(headless: bool, page_timeout_secs: u64) -> Result<Self> {
        info!("Launching {} Chrome...", if headless { "headless" } else { "windowed" });
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .args(vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--lang=es-MX"),
            ])
            .build()
            .context("Failed to build launch options")?;
        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        let user_agent = *USER_AGENTS
            .choose(&mut rand::thread_rng())
            .unwrap_or(&USER_AGENTS[0]);
        debug!("Session user agent: {user_agent}");

        Ok(Self {
            browser,
            user_agent,
            page_timeout: Duration::from_secs(page_timeout_secs),
            settle: Duration::from_secs(3),
        })
    }

    fn open_page(&self, url: &str) -> Result<Arc<Tab>, FetchError> {
        let nav_err = |reason: String| FetchError::Navigation {
            url: url.to_string(),
            reason,
        };

        let tab = self
            .browser
            .new_tab()
            .map_err(|e| nav_err(e.to_string()))?;
        tab.set_user_agent(self.user_agent, Some("es-MX,es;q=0.9,en;q=0.8"), None)
            .map_err(|e| nav_err(e.to_string()))?;

        tab.navigate_to(url).map_err(|e| nav_err(e.to_string()))?;
        tab.wait_until_navigated()
            .map_err(|e| nav_err(e.to_string()))?;

        // Readiness condition: body present within the timeout.
        if tab
            .wait_for_element_with_custom_timeout("body", self.page_timeout)
            .is_err()
        {
            let _ = tab.close(true);
            return Err(FetchError::Timeout {
                url: url.to_string(),
            });
        }

        Ok(tab)
    }

    fn read_page(tab: &Tab, url: &str) -> Result<FetchedPage, FetchError> {
        let nav_err = |reason: String| FetchError::Navigation {
            url: url.to_string(),
            reason,
        };

        let html = tab.get_content().map_err(|e| nav_err(e.to_string()))?;
        let final_url = tab.get_url();
        let _ = tab.close(true);

        debug!("Fetched {} bytes from {final_url}", html.len());
        Ok(FetchedPage { html, final_url })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        // The CDP calls are blocking; block_in_place keeps them off the
        // async workers while the settle pause stays a tokio sleep.
        let tab = tokio::task::block_in_place(|| self.open_page(url))?;
        tokio::time::sleep(self.settle).await;
        tokio::task::block_in_place(|| Self::read_page(&tab, url))
    }
}

/// Plain reqwest fallback with realistic headers and a cookie warm-up
/// request against the site root. Useful when the portal serves full HTML
/// without JavaScript, or as a second attempt after a challenge.
pub struct HttpFetcher {
    client: reqwest::Client,
    warmup_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("es-MX,es;q=0.9,en;q=0.8,en-US;q=0.7"),
        );
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let user_agent = *USER_AGENTS
            .choose(&mut rand::thread_rng())
            .unwrap_or(&USER_AGENTS[0]);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            warmup_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        // Pick up cookies first; some portals 403 cold requests.
        if let Err(e) = self.client.get(&self.warmup_url).send().await {
            warn!("Cookie warm-up against {} failed: {e}", self.warmup_url);
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        if !response.status().is_success() {
            return Err(FetchError::Navigation {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        let final_url = response.url().to_string();
        let html = response.text().await.map_err(map_err)?;
        Ok(FetchedPage { html, final_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_markers_are_case_insensitive() {
        let html = "<title>Just a Moment...</title><body></body>";
        assert_eq!(detect_challenge(html), Some("just a moment"));
    }

    #[test]
    fn turnstile_widget_is_detected() {
        let html = r#"<div class="cf-turnstile" data-sitekey="x"></div>"#;
        assert_eq!(detect_challenge(html), Some("turnstile"));
    }

    #[test]
    fn ordinary_listing_page_is_clean() {
        let html = "<html><body><div class='listing-card'>Casa en venta $1,000,000</div></body></html>";
        assert_eq!(detect_challenge(html), None);
    }
}
