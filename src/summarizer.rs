use crate::config::{PromptPair, SummaryConfig};
use crate::error::{CompletionError, ConfigError, FetchError, SummarizeError};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::filter::LinkFilter;
use crate::links::RelevantLinkSelector;
use crate::llm::ChatModel;
use crate::page::CleanedContent;
use crate::parsers::Parser;
use crate::prompt::PromptPayload;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fetches a website, cleans its text and asks a hosted model to summarize it.
///
/// Pages are fetched one after another; nothing runs concurrently. The
/// model handle is shared and never mutated.
pub struct WebsiteContentSummarizer {
    seed: Url,
    model: Arc<dyn ChatModel>,
    model_id: String,
    fetcher: Arc<dyn PageFetcher>,
    follow_links: bool,
    max_links: usize,
    link_filter: LinkFilter,
    link_selector: Option<RelevantLinkSelector>,
    max_content_chars: Option<usize>,
}

impl WebsiteContentSummarizer {
    /// Create a summarizer with default settings
    ///
    /// Fails with [`SummarizeError::InvalidUrl`] unless `seed_url` is an
    /// absolute http(s) URL with a host.
    pub fn new(
        seed_url: &str,
        model: Arc<dyn ChatModel>,
        model_id: impl Into<String>,
    ) -> Result<Self, SummarizeError> {
        Self::from_config(seed_url, model, model_id, &SummaryConfig::default())
    }

    /// Create a summarizer from summary settings
    pub fn from_config(
        seed_url: &str,
        model: Arc<dyn ChatModel>,
        model_id: impl Into<String>,
        settings: &SummaryConfig,
    ) -> Result<Self, SummarizeError> {
        let seed = parse_seed_url(seed_url)?;
        let link_filter = LinkFilter::for_seed(&seed, settings).map_err(ConfigError::from)?;

        Ok(Self {
            seed,
            model,
            model_id: model_id.into(),
            fetcher: Arc::new(HttpFetcher::new(Duration::from_secs(
                settings.fetch_timeout_secs,
            ))),
            follow_links: settings.follow_links,
            max_links: settings.max_links,
            link_filter,
            link_selector: settings.link_selection.clone().map(RelevantLinkSelector::new),
            max_content_chars: settings.max_content_chars,
        })
    }

    /// Replace the page fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Enable or disable fetching of linked pages
    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Set the maximum number of linked pages fetched
    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }

    /// Let the model pick which links to follow
    pub fn with_link_selection(mut self, prompts: PromptPair) -> Self {
        self.link_selector = Some(RelevantLinkSelector::new(prompts));
        self
    }

    /// Cap the combined page text (None for no cap)
    pub fn with_max_content_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_content_chars = max_chars;
        self
    }

    pub fn seed_url(&self) -> &Url {
        &self.seed
    }

    /// Fetch and clean the seed page and, if enabled, its linked pages
    ///
    /// Only a seed failure is an error. Linked pages that fail are logged
    /// and left out.
    pub async fn collect_content(&self) -> Result<Vec<CleanedContent>, SummarizeError> {
        ::log::info!("Fetching seed page: {}", self.seed);
        let page = self.fetcher.fetch(self.seed.as_str()).await.map_err(|e| {
            ::log::error!("Failed to fetch seed page {}: {}", self.seed, e);
            e
        })?;
        let parsed = Parser::parse(&page);
        ::log::debug!(
            "Seed page {} has {} characters of text and {} links",
            page.url,
            parsed.content.text.len(),
            parsed.links.len()
        );

        let mut pages = vec![parsed.content];
        if !self.follow_links {
            return Ok(pages);
        }

        let landed = Url::parse(&page.url).ok();
        let targets = self.link_targets(landed.as_ref(), &parsed.links).await;
        ::log::info!("Following {} linked pages", targets.len());

        let results = self.fetch_linked(&targets).await;
        for result in results {
            match result {
                Ok(content) => pages.push(content),
                Err(e) => ::log::warn!("Skipping linked page {}: {}", e.url(), e),
            }
        }

        Ok(pages)
    }

    /// Decide which discovered links are fetched, capped at `max_links`
    async fn link_targets(&self, landed: Option<&Url>, links: &[Url]) -> Vec<Url> {
        let mut fetched = vec![&self.seed];
        fetched.extend(landed);
        let candidates = self.link_filter.candidates(&fetched, links);
        ::log::debug!(
            "{} of {} discovered links are eligible",
            candidates.len(),
            links.len()
        );

        let targets: Vec<Url> = match &self.link_selector {
            Some(selector) => selector
                .select(self.model.as_ref(), &self.model_id, &self.seed, &candidates)
                .await
                .into_iter()
                .filter_map(|link| Url::parse(&link.url).ok())
                .collect(),
            None => candidates,
        };

        targets.into_iter().take(self.max_links).collect()
    }

    /// Fetch each target in turn; one failure never stops the rest
    async fn fetch_linked(&self, targets: &[Url]) -> Vec<Result<CleanedContent, FetchError>> {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self
                .fetcher
                .fetch(target.as_str())
                .await
                .map(|page| Parser::clean(&page));
            results.push(result);
        }
        results
    }

    /// Collect the site content and build the request payload
    pub async fn build_prompt(
        &self,
        system_prompt: &str,
        user_prompt_prefix: &str,
    ) -> Result<PromptPayload, SummarizeError> {
        let pages = self.collect_content().await?;
        if pages.iter().all(CleanedContent::is_empty) {
            return Err(SummarizeError::EmptyContent(self.seed.to_string()));
        }

        Ok(PromptPayload::new(
            system_prompt,
            user_prompt_prefix,
            &pages,
            self.max_content_chars,
        ))
    }

    /// Summarize the website
    ///
    /// The user message sent to the model is `user_prompt_prefix` followed
    /// by the combined page text. An empty reply is a
    /// [`CompletionError::Empty`].
    pub async fn summarize(
        &self,
        system_prompt: &str,
        user_prompt_prefix: &str,
    ) -> Result<String, SummarizeError> {
        let payload = self.build_prompt(system_prompt, user_prompt_prefix).await?;
        ::log::debug!("User message is {} characters", payload.user.len());

        let summary = self
            .model
            .complete(payload.into_request(&self.model_id))
            .await
            .map_err(|e| {
                ::log::error!("Error processing chat completion request: {}", e);
                e
            })?;

        if summary.trim().is_empty() {
            return Err(CompletionError::Empty.into());
        }

        ::log::info!("Summary of {} is {} characters", self.seed, summary.len());
        Ok(summary)
    }
}

fn parse_seed_url(seed_url: &str) -> Result<Url, SummarizeError> {
    let invalid = |reason: &str| SummarizeError::InvalidUrl {
        url: seed_url.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(seed_url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}
