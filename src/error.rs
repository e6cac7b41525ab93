//! Error types for fetching, model calls and summarization.

use thiserror::Error;

/// A page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure (connection refused, DNS, timeout)
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Server answered with a non-success status
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Response body could not be read
    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    /// Content type that carries no readable text (images, archives, ...)
    #[error("{url} has unsupported content type {content_type}")]
    Unsupported { url: String, content_type: String },
}

impl FetchError {
    /// URL the failed request was made to
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Body { url, .. }
            | FetchError::Unsupported { url, .. } => url,
        }
    }
}

/// The hosted chat-completion call failed.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error: {0}")]
    Api(String),

    /// Parse error (invalid JSON, unexpected response format)
    #[error("parse error: {0}")]
    Parse(String),

    /// The model answered with no content
    #[error("model returned an empty response")]
    Empty,
}

/// Terminal error of a summarization call.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("invalid seed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// Pages were fetched but contained no readable text
    #[error("no readable content at {0}")]
    EmptyContent(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Listing input/output or processing failed.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to access listings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("processing listing {name} failed: {source}")]
    Completion {
        name: String,
        #[source]
        source: CompletionError,
    },

    #[error("listing task failed: {0}")]
    Task(String),
}
