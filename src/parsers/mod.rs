pub mod html;
pub mod text;


use crate::page::{CleanedContent, Page};
use scraper::Html;
use url::Url;

/// Kind of body a fetched page carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserType {
    /// HTML markup
    Html,
    /// Plain text
    Text,
}

impl ParserType {
    /// Determines the parser type from the page's declared content type
    pub fn for_page(page: &Page) -> Self {
        if page.is_plain_text() {
            ::log::debug!("Classifying as Text: {}", page.url);
            ParserType::Text
        } else {
            ::log::debug!("Classifying as HTML: {}", page.url);
            ParserType::Html
        }
    }

    /// Returns if the parser should extract links
    pub fn should_extract_links(&self) -> bool {
        matches!(self, ParserType::Html)
    }
}

/// Result of parsing a page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Cleaned text and title
    pub content: CleanedContent,
    /// Absolute outbound links (empty for plain text)
    pub links: Vec<Url>,
}

/// Main parser that delegates to specific format parsers
pub struct Parser;

impl Parser {
    /// Clean a page and discover its links
    pub fn parse(page: &Page) -> ParsedPage {
        match ParserType::for_page(page) {
            ParserType::Text => ParsedPage {
                content: CleanedContent::new(&page.url, None, text::normalize(&page.body)),
                links: Vec::new(),
            },
            ParserType::Html => {
                let doc = Html::parse_document(&page.body);
                let title = html::extract_title(&doc);
                let cleaned = html::clean_document(&doc);
                let links = match Url::parse(&page.url) {
                    Ok(base) => html::extract_links(&doc, &base),
                    Err(e) => {
                        ::log::warn!("Cannot resolve links of {}: {}", page.url, e);
                        Vec::new()
                    }
                };
                ParsedPage {
                    content: CleanedContent::new(&page.url, title, cleaned),
                    links,
                }
            }
        }
    }

    /// Clean a page without discovering links
    pub fn clean(page: &Page) -> CleanedContent {
        match ParserType::for_page(page) {
            ParserType::Text => CleanedContent::new(&page.url, None, text::normalize(&page.body)),
            ParserType::Html => {
                let doc = Html::parse_document(&page.body);
                CleanedContent::new(
                    &page.url,
                    html::extract_title(&doc),
                    html::clean_document(&doc),
                )
            }
        }
    }
}
