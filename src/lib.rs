// Re-export modules
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod links;
pub mod listings;
pub mod llm;
pub mod page;
pub mod parsers;
pub mod prompt;
pub mod summarizer;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use discovery::ListingScraper;
pub use config::{AppConfig, ModelConfig, PromptPair, SummaryConfig};
pub use error::{CompletionError, ConfigError, FetchError, ListingError, SummarizeError};
pub use fetch::{HttpFetcher, PageFetcher};
pub use listings::{BusinessListing, ListingProcessor};
pub use llm::{ChatModel, ChatRequest, OpenAiClient};
pub use page::{CleanedContent, Page};
pub use prompt::PromptPayload;
pub use summarizer::WebsiteContentSummarizer;
