use crate::llm::{ChatRequest, Message};
use crate::page::CleanedContent;
use crate::parsers::text;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an assistant that analyzes the contents of a \
company website and writes a short brochure about the company for prospective customers, \
investors and recruits. Ignore navigation text. Respond in markdown.";

pub const SUMMARY_USER_PROMPT: &str = "Here are the contents of the website. Write a short \
summary of what the company does, who it serves and anything notable about it.\n\n";

pub const LINK_SELECTION_SYSTEM_PROMPT: &str = "You are provided with a list of links found on \
a webpage. Decide which links are most relevant to include in a brochure about the company, \
such as links to an About page, a Company page, Services or Careers. Do not include Terms of \
Service, Privacy or email links. Respond in JSON as in this example:\n\
{\"links\": [{\"type\": \"about page\", \"url\": \"https://full.url/goes/here/about\"}]}";

pub const LINK_SELECTION_USER_PROMPT: &str = "Here is the list of links on the website {url}. \
Decide which of these are relevant web links for a brochure about the company, and respond \
with the full https URL in JSON format.\nLinks (some might be relative links):\n";

pub const LISTING_CLEANING_SYSTEM_PROMPT: &str = "You clean scraped business listing pages. \
Remove navigation, adverts, cookie notices and unrelated listings. Keep every fact about the \
business itself. Return plain text only.";

pub const LISTING_CLEANING_USER_PROMPT: &str = "Clean the following listing:\n\n{content}";

pub const LISTING_EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured data from business \
listings. Respond with a single JSON object with the keys: name, category, location, \
description, services, contact. Use null for anything not present.";

pub const LISTING_EXTRACTION_USER_PROMPT: &str = "Extract the information from this listing:\n\n{content}";

/// Separator placed between the text of consecutive pages
pub const PAGE_SEPARATOR: &str = "\n\n";

/// System and user messages for a single completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
}

impl PromptPayload {
    /// Build the payload: the user message is the prefix followed directly
    /// by the combined page text
    pub fn new(
        system_prompt: &str,
        user_prompt_prefix: &str,
        pages: &[CleanedContent],
        max_chars: Option<usize>,
    ) -> Self {
        let combined = combine_pages(pages, max_chars);
        let mut user = String::with_capacity(user_prompt_prefix.len() + combined.len());
        user.push_str(user_prompt_prefix);
        user.push_str(&combined);

        Self {
            system: system_prompt.to_string(),
            user,
        }
    }

    pub fn into_request(self, model: &str) -> ChatRequest {
        ChatRequest::new(model)
            .message(Message::system(self.system))
            .message(Message::user(self.user))
    }
}

/// Concatenates non-empty page texts, then caps the result at `max_chars`
pub fn combine_pages(pages: &[CleanedContent], max_chars: Option<usize>) -> String {
    let combined = pages
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR);

    match max_chars {
        Some(max) => text::truncate_chars(&combined, max).to_string(),
        None => combined,
    }
}

/// Substitutes `{name}` in a prompt template
pub fn fill(template: &str, name: &str, value: &str) -> String {
    template.replace(&format!("{{{}}}", name), value)
}

/// Strip a markdown code fence models sometimes wrap JSON answers in
pub fn strip_code_fence(answer: &str) -> &str {
    let trimmed = answer.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim()
}
