use serde::{Deserialize, Serialize};

/// A fetched page: the URL it came from and its raw body
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL of the page
    pub url: String,

    /// Raw markup (or plain text) as returned by the server
    pub body: String,

    /// Value of the Content-Type header, if any
    pub content_type: Option<String>,
}

impl Page {
    /// Create a page with an HTML body
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_type: Some("text/html".to_string()),
        }
    }

    /// Whether the server declared the body as plain text
    pub fn is_plain_text(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim_start().starts_with("text/plain"))
            .unwrap_or(false)
    }
}

/// Whether a Content-Type header value names a format text can be read from
pub fn is_readable_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime == "application/xhtml+xml" || mime == "application/xml"
}

/// Readable text of one page with non-content markup removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedContent {
    /// URL of the page
    pub url: String,

    /// Title of the page (if available)
    pub title: Option<String>,

    /// Cleaned text, one text block per line
    pub text: String,
}

impl CleanedContent {
    pub fn new(url: impl Into<String>, title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title,
            text: text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
