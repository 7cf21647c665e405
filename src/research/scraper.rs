// src/research/scraper.rs
// Two-tier web discovery. Primary: a headless-browser session that can see
// JavaScript-rendered result pages. Secondary: a direct HTTP request against
// the static DuckDuckGo HTML endpoint. The master search tries primary first
// and falls through on error or zero hits; both tiers failing yields an empty
// list, not an error. Page fetch extracts paragraph text and yields an empty
// string on any failure.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CoreError, CoreResult};

const LITE_SEARCH_URL: &str = "https://lite.duckduckgo.com/lite/";
const HTML_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Paragraphs of a fetched page kept as working text.
const MAX_PARAGRAPHS: usize = 20;

/// Result-page labels that are navigation chrome, not results.
const BOILERPLATE_TITLES: [&str; 3] = ["more info", "ad", "sponsored"];

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One candidate source found by a search tier. Transient; not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// One tier of the discovery fallback chain.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str) -> CoreResult<Vec<SearchHit>>;
}

/// Retrieves the working text of one candidate page. Total: failures and
/// unusable pages yield an empty string.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> String;
}

/// Discard non-http links, boilerplate labels and search-provider ad/help
/// plumbing.
fn keep_hit(title: &str, url: &str) -> bool {
    // Relative links and non-web schemes are never candidate sources.
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        _ => return false,
    }
    let lowered_title = title.trim().to_lowercase();
    if lowered_title.is_empty() || BOILERPLATE_TITLES.contains(&lowered_title.as_str()) {
        return false;
    }
    let lowered_url = url.to_lowercase();
    if lowered_url.contains("duckduckgo.com/y.js")
        || lowered_url.contains("ad_domain=")
        || lowered_url.contains("/duckduckgo-help-pages/")
    {
        return false;
    }
    true
}

fn parse_anchor_results(html: &str, css_selector: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(css_selector) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut hits = Vec::new();
    for anchor in document.select(&selector) {
        let title = anchor.text().collect::<String>().trim().to_string();
        let url = anchor.value().attr("href").unwrap_or("").to_string();
        if keep_hit(&title, &url) {
            hits.push(SearchHit { title, url });
        }
    }
    hits
}

/// Primary tier: full browser session against the lite result page.
pub struct BrowserSearch;

impl BrowserSearch {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BrowserSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for BrowserSearch {
    fn name(&self) -> &str {
        "browser"
    }

    async fn search(&self, query: &str) -> CoreResult<Vec<SearchHit>> {
        debug!(query = %query, "Browser search tier");
        let query = query.to_string();

        // Browser ops are blocking; run off the async runtime.
        let html = tokio::task::spawn_blocking(move || -> Result<String, String> {
            let options = headless_chrome::LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false)
                .idle_browser_timeout(Duration::from_secs(60))
                .build()
                .map_err(|e| e.to_string())?;
            let browser = headless_chrome::Browser::new(options).map_err(|e| e.to_string())?;

            let tab = browser.new_tab().map_err(|e| e.to_string())?;
            tab.navigate_to(LITE_SEARCH_URL).map_err(|e| e.to_string())?;
            tab.wait_until_navigated().map_err(|e| e.to_string())?;

            tab.find_element("input[name=q]")
                .map_err(|e| e.to_string())?
                .click()
                .map_err(|e| e.to_string())?;
            tab.type_str(&query).map_err(|e| e.to_string())?;
            tab.press_key("Enter").map_err(|e| e.to_string())?;

            std::thread::sleep(Duration::from_secs(2));
            tab.get_content().map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?
        .map_err(CoreError::Transport)?;

        let hits = parse_anchor_results(&html, "a.result-link");
        debug!(hits = hits.len(), "Browser search parsed");
        Ok(hits)
    }
}

/// Secondary tier: one HTTP POST against the static HTML result page.
pub struct HttpSearch {
    client: reqwest::Client,
}

impl HttpSearch {
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchStrategy for HttpSearch {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, query: &str) -> CoreResult<Vec<SearchHit>> {
        debug!(query = %query, "HTTP search tier");

        let response = self
            .client
            .post(HTML_SEARCH_URL)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let html = response
            .text()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let hits = parse_anchor_results(&html, "a.result__a");
        debug!(hits = hits.len(), "HTTP search parsed");
        Ok(hits)
    }
}

/// HTTP paragraph-extracting fetcher used by the canonical chain.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> String {
        debug!(url = %url, "Fetching page");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "Page fetch failed");
                return String::new();
            }
        };

        let html = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Page body read failed");
                return String::new();
            }
        };

        extract_paragraphs(&html)
    }
}

/// Master search: primary tier first, secondary on error or empty result.
/// Total at this boundary - both tiers failing produces an empty Vec.
pub struct WebSearch {
    primary: Box<dyn SearchStrategy>,
    secondary: Box<dyn SearchStrategy>,
    fetcher: Box<dyn PageFetcher>,
}

impl WebSearch {
    /// Canonical chain: browser session over the lite page, HTTP fallback,
    /// paragraph-extracting page fetch.
    pub fn duckduckgo(timeout: Duration) -> CoreResult<Self> {
        Ok(Self::with_strategies(
            Box::new(BrowserSearch::new()),
            Box::new(HttpSearch::new(timeout)?),
            Box::new(HttpFetcher::new(timeout)?),
        ))
    }

    pub fn with_strategies(
        primary: Box<dyn SearchStrategy>,
        secondary: Box<dyn SearchStrategy>,
        fetcher: Box<dyn PageFetcher>,
    ) -> Self {
        Self {
            primary,
            secondary,
            fetcher,
        }
    }

    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        match self.primary.search(query).await {
            Ok(hits) if !hits.is_empty() => {
                info!(tier = self.primary.name(), hits = hits.len(), "Search succeeded");
                return hits;
            }
            Ok(_) => {
                debug!(tier = self.primary.name(), "Primary tier found nothing");
            }
            Err(e) => {
                warn!(tier = self.primary.name(), error = %e, "Primary tier failed");
            }
        }

        match self.secondary.search(query).await {
            Ok(hits) => {
                info!(tier = self.secondary.name(), hits = hits.len(), "Fallback search done");
                hits
            }
            Err(e) => {
                warn!(tier = self.secondary.name(), error = %e, "Fallback tier failed");
                Vec::new()
            }
        }
    }

    /// Fetch a candidate page and keep the first paragraphs as working text.
    /// Any failure yields an empty string; callers treat empty as "no usable
    /// content".
    pub async fn fetch_page(&self, url: &str) -> String {
        self.fetcher.fetch_page(url).await
    }
}

fn extract_paragraphs(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("p") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    document
        .select(&selector)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_PARAGRAPHS)
        .collect::<Vec<_>>()
        .join("\n")
}
