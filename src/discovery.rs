//! Discovery of business listings from a paginated search results site.
//!
//! Search pages advertise their results as a JSON-LD `ItemList`. Each
//! listing found there is fetched and its readable text becomes the raw
//! content that [`crate::listings::ListingProcessor`] later cleans.

use crate::config::ListingsConfig;
use crate::error::{FetchError, ListingError};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::listings::BusinessListing;
use crate::page::Page;
use crate::parsers::html;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use url::Url;

static JSON_LD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector")
});
static ERROR_CODE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.error-code").expect("static selector"));

/// A listing named on a search results page, before its content is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub page: usize,
    pub name: String,
    pub url: String,
}

/// Walks search result pages and collects the listings they link to
pub struct ListingScraper {
    search_url: String,
    max_pages: usize,
    fetch_retries: usize,
    fetcher: Arc<dyn PageFetcher>,
}

impl ListingScraper {
    /// `search_url` is the first results page; page `n > 1` lives at `{search_url}-{n}`
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            max_pages: 1,
            fetch_retries: 2,
            fetcher: Arc::new(HttpFetcher::default()),
        }
    }

    pub fn from_config(search_url: impl Into<String>, config: &ListingsConfig) -> Self {
        Self::new(search_url)
            .with_max_pages(config.max_pages)
            .with_fetch_retries(config.fetch_retries)
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_fetch_retries(mut self, retries: usize) -> Self {
        self.fetch_retries = retries;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn page_url(&self, page: usize) -> String {
        if page > 1 {
            format!("{}-{}", self.search_url, page)
        } else {
            self.search_url.clone()
        }
    }

    /// Discover listings and fetch the content of each one
    pub async fn scrape(&self) -> Result<Vec<BusinessListing>, ListingError> {
        let links = self.discover().await?;
        Ok(self.enrich(links).await)
    }

    /// Collect listing links page by page
    ///
    /// Stops at the first page that is missing, flagged as an error page or
    /// lists nothing. Only a failure on the first page is an error.
    pub async fn discover(&self) -> Result<Vec<ListingLink>, ListingError> {
        let mut links = Vec::new();

        for page in 1..=self.max_pages {
            let url = self.page_url(page);
            ::log::info!("[Page {}] Extracting listings from {}", page, url);

            let fetched = match self.fetch_with_retries(&url).await {
                Ok(fetched) => fetched,
                Err(e) if page == 1 => return Err(e.into()),
                Err(e) => {
                    ::log::info!("Stopping at page {}: {}", page, e);
                    break;
                }
            };

            let doc = Html::parse_document(&fetched.body);
            if is_error_page(&doc) {
                ::log::info!("Page {} is an error page, stopping", page);
                break;
            }

            let base = Url::parse(&fetched.url).ok();
            let found = extract_listing_links(&doc, base.as_ref(), page);
            if found.is_empty() {
                ::log::info!("No listings on page {}, stopping", page);
                break;
            }
            ::log::debug!("Page {} lists {} businesses", page, found.len());
            links.extend(found);
        }

        ::log::info!("Discovered {} listings", links.len());
        Ok(links)
    }

    /// Fetch each listing in turn; a failed listing keeps empty content
    pub async fn enrich(&self, links: Vec<ListingLink>) -> Vec<BusinessListing> {
        let total = links.len();
        let mut listings = Vec::with_capacity(total);

        for (idx, link) in links.into_iter().enumerate() {
            ::log::info!("[{}/{}] Extracting content from: {}", idx + 1, total, link.url);
            let content = match self.fetcher.fetch(&link.url).await {
                Ok(page) => clean_listing(&page.body),
                Err(e) => {
                    ::log::error!("Failed to extract content from {}: {}", link.url, e);
                    String::new()
                }
            };

            let mut listing = BusinessListing::new(link.name, link.url, content);
            listing.page = Some(link.page);
            listings.push(listing);
        }
        listings
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<Page, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(url).await {
                Ok(page) => return Ok(page),
                // A missing page means pagination ran out
                Err(e @ FetchError::Status { status: 404, .. }) => return Err(e),
                Err(e) if attempt < self.fetch_retries => {
                    attempt += 1;
                    ::log::warn!("[Retry {}] Failed to fetch {}: {}", attempt, url, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether a search page is the site's "HTTP ERROR 404" page served with a 200
pub fn is_error_page(doc: &Html) -> bool {
    doc.select(&ERROR_CODE_SELECTOR)
        .any(|div| div.text().collect::<String>().contains("HTTP ERROR 404"))
}

/// Listings advertised in the JSON-LD `ItemList` blocks of a search page
///
/// Blocks that are not valid JSON are skipped. Relative listing URLs are
/// resolved against `base` when it is known.
pub fn extract_listing_links(doc: &Html, base: Option<&Url>, page: usize) -> Vec<ListingLink> {
    let mut links = Vec::new();

    for script in doc.select(&JSON_LD_SELECTOR) {
        let raw = script.text().collect::<String>();
        let data: Value = match serde_json::from_str(raw.trim()) {
            Ok(data) => data,
            Err(e) => {
                ::log::debug!("Skipping unparsable JSON-LD block: {}", e);
                continue;
            }
        };
        if data.get("@type").and_then(Value::as_str) != Some("ItemList") {
            continue;
        }

        let items = data
            .get("itemListElement")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for item in items {
            if item.get("@type").and_then(Value::as_str) != Some("ListItem") {
                continue;
            }
            let Some(url) = item.get("url").and_then(Value::as_str) else {
                continue;
            };
            let url = match base.and_then(|b| b.join(url.trim()).ok()) {
                Some(resolved) => resolved.to_string(),
                None => url.trim().to_string(),
            };
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            links.push(ListingLink { page, name, url });
        }
    }
    links
}

/// Readable text of a listing page, footers included in what gets dropped
pub fn clean_listing(markup: &str) -> String {
    let doc = Html::parse_document(markup);
    html::clean_document_excluding(&doc, html::LISTING_NON_CONTENT_ELEMENTS)
}
