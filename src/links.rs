use crate::config::PromptPair;
use crate::llm::{ChatModel, ChatRequest};
use crate::prompt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// A link the model picked, with the kind of page it claims it is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantLink {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct LinkSelectionResponse {
    links: Vec<RelevantLink>,
}

/// Asks the model which of a page's links are worth reading for a brochure
#[derive(Debug, Clone)]
pub struct RelevantLinkSelector {
    prompts: PromptPair,
}

impl Default for RelevantLinkSelector {
    fn default() -> Self {
        Self::new(PromptPair::new(
            prompt::LINK_SELECTION_SYSTEM_PROMPT,
            prompt::LINK_SELECTION_USER_PROMPT,
        ))
    }
}

impl RelevantLinkSelector {
    /// `prompts.user` may contain `{url}`, replaced by the page URL
    pub fn new(prompts: PromptPair) -> Self {
        Self { prompts }
    }

    /// User message: the filled template followed by one link per line
    pub fn user_message(&self, base_url: &Url, links: &[Url]) -> String {
        let mut message = prompt::fill(&self.prompts.user, "url", base_url.as_str());
        let listed = links.iter().map(Url::as_str).collect::<Vec<_>>().join("\n");
        message.push_str(&listed);
        message
    }

    /// Select relevant links among `links`
    ///
    /// Never fails: a model error or an unparsable answer is logged and
    /// yields no links. Answers naming URLs outside `links` are dropped,
    /// relative answers are resolved against `base_url`.
    pub async fn select(
        &self,
        model: &dyn ChatModel,
        model_id: &str,
        base_url: &Url,
        links: &[Url],
    ) -> Vec<RelevantLink> {
        if links.is_empty() {
            return Vec::new();
        }

        let request = ChatRequest::system_user(
            model_id,
            &self.prompts.system,
            self.user_message(base_url, links),
        )
        .json_object();

        let answer = match model.complete(request).await {
            Ok(answer) => answer,
            Err(e) => {
                ::log::error!("Link selection request failed: {}", e);
                return Vec::new();
            }
        };

        let parsed = match parse_selection(&answer) {
            Ok(parsed) => parsed,
            Err(e) => {
                ::log::error!("Failed to parse model response for link selection: {}", e);
                return Vec::new();
            }
        };

        let allowed: HashSet<&str> = links.iter().map(Url::as_str).collect();
        let mut seen = HashSet::new();
        let selected: Vec<RelevantLink> = parsed
            .into_iter()
            .filter_map(|link| {
                let resolved = base_url.join(link.url.trim()).ok()?;
                let resolved = resolved.to_string();
                if !allowed.contains(resolved.as_str()) {
                    ::log::debug!("Model picked unknown link, skipping: {}", link.url);
                    return None;
                }
                seen.insert(resolved.clone()).then(|| RelevantLink {
                    kind: link.kind,
                    url: resolved,
                })
            })
            .collect();

        ::log::info!(
            "Model selected {} of {} links on {}",
            selected.len(),
            links.len(),
            base_url
        );
        selected
    }
}

/// Parse `{"links": [...]}`, tolerating a markdown code fence around it
pub fn parse_selection(answer: &str) -> Result<Vec<RelevantLink>, serde_json::Error> {
    let response: LinkSelectionResponse = serde_json::from_str(prompt::strip_code_fence(answer))?;
    Ok(response.links)
}
