use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Settings for the hosted chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for a single completion request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Request a streamed response and accumulate it
    #[serde(default)]
    pub streaming: bool,
}

/// A system prompt and the user prompt that accompanies it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Configuration for website summarization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Prompts for the summary request
    #[serde(default = "default_summary_prompts")]
    pub prompts: PromptPair,

    /// Whether to fetch pages linked from the seed page
    #[serde(default)]
    pub follow_links: bool,

    /// Maximum number of linked pages fetched
    #[serde(default = "default_max_links")]
    pub max_links: usize,

    /// Whether linked pages on other domains may be followed
    #[serde(default)]
    pub allow_external: bool,

    /// Regex patterns for links to include
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for links to exclude
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Prompts for model-ranked link selection (plain filtering when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selection: Option<PromptPair>,

    /// Per-page fetch timeout
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Cap on the combined page text, in characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: Option<usize>,
}

/// Configuration for business listing processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingsConfig {
    /// Prompts used to strip irrelevant text from a listing
    #[serde(default = "default_cleaning_prompts")]
    pub cleaning: PromptPair,

    /// Prompts used to extract structured JSON from a cleaned listing
    #[serde(default = "default_extraction_prompts")]
    pub extraction: PromptPair,

    /// Maximum number of listings in flight at once
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Number of search result pages walked when discovering listings
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Extra attempts for a search page whose fetch failed
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: usize,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub listings: ListingsConfig,
}

impl AppConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }
}

impl ModelConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key_from_env(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingEnv(self.api_key_env.clone())),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            streaming: false,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            prompts: default_summary_prompts(),
            follow_links: false,
            max_links: default_max_links(),
            allow_external: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            link_selection: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl Default for ListingsConfig {
    fn default() -> Self {
        Self {
            cleaning: default_cleaning_prompts(),
            extraction: default_extraction_prompts(),
            concurrency_limit: default_concurrency_limit(),
            max_pages: default_max_pages(),
            fetch_retries: default_fetch_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Default limit on followed links
pub(crate) fn default_max_links() -> usize {
    5
}

/// Default per-page fetch timeout
pub(crate) fn default_fetch_timeout_secs() -> u64 {
    10
}

/// Default cap on combined page text
pub(crate) fn default_max_content_chars() -> Option<usize> {
    Some(5000)
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_max_pages() -> usize {
    1
}

fn default_fetch_retries() -> usize {
    2
}

fn default_summary_prompts() -> PromptPair {
    PromptPair::new(
        crate::prompt::SUMMARY_SYSTEM_PROMPT,
        crate::prompt::SUMMARY_USER_PROMPT,
    )
}

fn default_cleaning_prompts() -> PromptPair {
    PromptPair::new(
        crate::prompt::LISTING_CLEANING_SYSTEM_PROMPT,
        crate::prompt::LISTING_CLEANING_USER_PROMPT,
    )
}

fn default_extraction_prompts() -> PromptPair {
    PromptPair::new(
        crate::prompt::LISTING_EXTRACTION_SYSTEM_PROMPT,
        crate::prompt::LISTING_EXTRACTION_USER_PROMPT,
    )
}
