//! Business listings prepared for a retrieval-backed chat assistant.
//!
//! Raw scraped listings are cleaned and turned into structured JSON by the
//! model, then converted into documents for an external retrieval index.

use crate::config::{ListingsConfig, PromptPair};
use crate::error::ListingError;
use crate::llm::{ChatModel, ChatRequest};
use crate::prompt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A business listing with raw and processed content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessListing {
    pub name: String,
    pub url: String,

    /// Search results page the listing was discovered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,

    /// Unprocessed text scraped from the listing page
    #[serde(alias = "content")]
    pub raw_content: String,

    /// Listing text with irrelevant content removed
    #[serde(default)]
    pub cleaned_content: String,

    /// Structured fields extracted from the cleaned text
    #[serde(default)]
    pub extracted_info: Map<String, Value>,
}

impl BusinessListing {
    pub fn new(name: impl Into<String>, url: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            page: None,
            raw_content: raw_content.into(),
            cleaned_content: String::new(),
            extracted_info: Map::new(),
        }
    }
}

/// Read listings from a JSON array file
pub fn load_listings<P: AsRef<Path>>(path: P) -> Result<Vec<BusinessListing>, ListingError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write listings as a pretty-printed JSON array
pub fn save_listings<P: AsRef<Path>>(path: P, listings: &[BusinessListing]) -> Result<(), ListingError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, listings)?;
    writer.flush()?;
    Ok(())
}

/// Cleans and extracts structured info from listings using the model
pub struct ListingProcessor {
    cleaning: PromptPair,
    extraction: PromptPair,
    model: Arc<dyn ChatModel>,
    model_id: String,
    concurrency_limit: usize,
}

impl ListingProcessor {
    /// Prompt user templates must contain `{content}`
    pub fn new(
        cleaning: PromptPair,
        extraction: PromptPair,
        model: Arc<dyn ChatModel>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            cleaning,
            extraction,
            model,
            model_id: model_id.into(),
            concurrency_limit: 10,
        }
    }

    pub fn from_config(config: &ListingsConfig, model: Arc<dyn ChatModel>, model_id: impl Into<String>) -> Self {
        Self::new(config.cleaning.clone(), config.extraction.clone(), model, model_id)
            .with_concurrency_limit(config.concurrency_limit)
    }

    /// Maximum number of listings processed at the same time (at least 1)
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Process all listings, preserving their order
    ///
    /// A model failure on any listing fails the whole batch.
    pub async fn process(
        self: &Arc<Self>,
        listings: Vec<BusinessListing>,
    ) -> Result<Vec<BusinessListing>, ListingError> {
        let total = listings.len();
        ::log::info!(
            "Processing {} listings with up to {} in flight",
            total,
            self.concurrency_limit
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut handles = Vec::with_capacity(total);
        for listing in listings {
            let processor = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ListingError::Task(e.to_string()))?;
                processor.process_one(listing).await
            }));
        }

        let mut processed = Vec::with_capacity(total);
        for (idx, handle) in handles.into_iter().enumerate() {
            let listing = handle
                .await
                .map_err(|e| ListingError::Task(e.to_string()))??;
            ::log::debug!("[{}/{}] Processed listing: {}", idx + 1, total, listing.name);
            processed.push(listing);
        }
        Ok(processed)
    }

    /// Clean one listing, then extract structured info from the cleaned text
    pub async fn process_one(&self, mut listing: BusinessListing) -> Result<BusinessListing, ListingError> {
        let cleaned = self
            .call(&self.cleaning, &listing.raw_content)
            .await
            .map_err(|source| ListingError::Completion {
                name: listing.name.clone(),
                source,
            })?;
        listing.cleaned_content = cleaned.trim().to_string();

        let extracted = self
            .call(&self.extraction, &listing.cleaned_content)
            .await
            .map_err(|source| ListingError::Completion {
                name: listing.name.clone(),
                source,
            })?;
        listing.extracted_info = parse_extracted_info(&extracted).unwrap_or_else(|| {
            ::log::warn!("Extraction for {} was not a JSON object", listing.name);
            let mut fallback = Map::new();
            fallback.insert(
                "error".to_string(),
                Value::String("Failed to parse JSON".to_string()),
            );
            fallback
        });

        Ok(listing)
    }

    async fn call(
        &self,
        prompts: &PromptPair,
        content: &str,
    ) -> Result<String, crate::error::CompletionError> {
        let user = prompt::fill(&prompts.user, "content", content);
        self.model
            .complete(ChatRequest::system_user(&self.model_id, &prompts.system, user))
            .await
    }
}

/// Parse a model answer as a JSON object, tolerating a markdown code fence
fn parse_extracted_info(answer: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(prompt::strip_code_fence(answer)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// A processed listing in the shape a retrieval index ingests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDocument {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl From<&BusinessListing> for ListingDocument {
    fn from(listing: &BusinessListing) -> Self {
        let summary = serde_json::to_string_pretty(&listing.extracted_info)
            .unwrap_or_else(|_| "{}".to_string());
        let text = format!(
            "Listing Content:\n{}\n\nStructured Summary:\n{}",
            listing.cleaned_content, summary
        );

        let mut metadata = listing.extracted_info.clone();
        metadata.insert("title".to_string(), Value::String(listing.name.clone()));
        metadata.insert("url".to_string(), Value::String(listing.url.clone()));

        Self { text, metadata }
    }
}

/// Write retrieval documents as a pretty-printed JSON array
pub fn save_documents<P: AsRef<Path>>(path: P, listings: &[BusinessListing]) -> Result<(), ListingError> {
    let documents: Vec<ListingDocument> = listings.iter().map(ListingDocument::from).collect();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &documents)?;
    writer.flush()?;
    Ok(())
}
