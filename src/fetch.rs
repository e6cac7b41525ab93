use crate::error::FetchError;
use crate::page::{self, Page};
use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{Client, header};
use std::time::Duration;

/// Browser-like User-Agent; many sites refuse obvious bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

pub const DEFAULT_REFERER: &str = "https://www.google.com/";

/// Bodies beyond this size are cut off; the summary only reads a few thousand characters
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Retrieves a single page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

/// Fetches pages over HTTP with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    user_agent: String,
    referer: Option<String>,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: Some(DEFAULT_REFERER.to_string()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reuse an existing reqwest client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set or clear the Referer header
    pub fn with_referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer;
        self
    }

    /// Cap on the number of body bytes read per page
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::default_fetch_timeout_secs()))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let start = std::time::Instant::now();
        ::log::debug!("FETCH: {}", url);

        let mut request = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(header::USER_AGENT, &self.user_agent);
        if let Some(referer) = &self.referer {
            request = request.header(header::REFERER, referer);
        }

        let mut response = request.send().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        if let Some(content_type) = content_type.as_deref() {
            if !page::is_readable_content_type(content_type) {
                return Err(FetchError::Unsupported {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })? {
            let room = self.max_body_bytes - buffer.len();
            if chunk.len() > room {
                buffer.extend_from_slice(&chunk[..room]);
                ::log::warn!(
                    "Body of {} exceeds {} bytes, truncating",
                    final_url,
                    self.max_body_bytes
                );
                break;
            }
            buffer.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&buffer).into_owned();

        ::log::debug!(
            "Fetched {} ({} bytes) in {:.2} seconds",
            final_url,
            body.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(Page {
            url: final_url,
            body,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HttpFixture;

    #[test]
    fn test_default_timeout() {
        assert_eq!(HttpFetcher::default().timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        // Port 9 (discard) on localhost is closed on any sane test machine
        let result = fetcher.fetch("http://127.0.0.1:9/").await;
        match result {
            Err(FetchError::Request { url, .. }) => assert_eq!(url, "http://127.0.0.1:9/"),
            other => panic!("expected request error, got {:?}", other.map(|p| p.url)),
        }
    }

    #[tokio::test]
    async fn test_malformed_url_is_request_error() {
        let fetcher = HttpFetcher::default();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::Request { .. })));
    }

    fn loopback_fetcher() -> HttpFetcher {
        HttpFetcher::default().with_client(crate::testing::loopback_client())
    }

    #[tokio::test]
    async fn test_html_page_with_browser_headers() {
        let server = HttpFixture::serve(200, "text/html; charset=utf-8", "<p>We build trucks.</p>").await;
        let page = loopback_fetcher().fetch(&server.url("/about")).await.unwrap();

        assert_eq!(page.url, server.url("/about"));
        assert_eq!(page.body, "<p>We build trucks.</p>");
        assert_eq!(page.content_type.as_deref(), Some("text/html; charset=utf-8"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("get /about http/1.1"));
        assert!(requests[0].contains(&format!("user-agent: {}", DEFAULT_USER_AGENT.to_lowercase())));
        assert!(requests[0].contains("referer: https://www.google.com/"));
    }

    #[tokio::test]
    async fn test_custom_headers() {
        let server = HttpFixture::serve(200, "text/html", "<p>x</p>").await;
        loopback_fetcher()
            .with_user_agent("site-summary-test")
            .with_referer(None)
            .fetch(&server.url("/"))
            .await
            .unwrap();

        let request = &server.requests()[0];
        assert!(request.contains("user-agent: site-summary-test"));
        assert!(!request.contains("referer:"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_status_error() {
        let server = HttpFixture::serve(503, "text/html", "<p>down</p>").await;
        let url = server.url("/about");
        match loopback_fetcher().fetch(&url).await {
            Err(FetchError::Status { url: failed, status }) => {
                assert_eq!(status, 503);
                assert_eq!(failed, url);
            }
            other => panic!("expected status error, got {:?}", other.map(|p| p.url)),
        }
    }

    #[tokio::test]
    async fn test_binary_content_is_unsupported() {
        let server = HttpFixture::serve(200, "image/png", vec![0x89, b'P', b'N', b'G']).await;
        let result = loopback_fetcher().fetch(&server.url("/logo")).await;
        match result {
            Err(FetchError::Unsupported { content_type, .. }) => assert_eq!(content_type, "image/png"),
            other => panic!("expected unsupported content, got {:?}", other.map(|p| p.url)),
        }
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let server = HttpFixture::serve(200, "text/plain", "abcdefghijklmnopqrstuvwxyz").await;
        let page = loopback_fetcher()
            .with_max_body_bytes(10)
            .fetch(&server.url("/"))
            .await
            .unwrap();
        assert_eq!(page.body, "abcdefghij");
        assert!(page.is_plain_text());
    }
}
