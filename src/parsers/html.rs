use crate::parsers::text;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Elements whose whole subtree is dropped before text extraction
pub const NON_CONTENT_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "svg", "img", "input", "button", "iframe",
];

/// Listing pages also carry site-wide footers that say nothing about the business
pub const LISTING_NON_CONTENT_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "svg", "img", "input", "button", "iframe",
    "footer",
];

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("static selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Extracts the readable text of an HTML document
///
/// Non-content subtrees are skipped, every remaining text node becomes a
/// line, and the result is passed through [`text::normalize`].
pub fn clean(html: &str) -> String {
    let doc = Html::parse_document(html);
    clean_document(&doc)
}

/// Same as [`clean`] for an already parsed document
///
/// Entity-escaped markup (`&lt;script&gt;`) decodes to literal tags in
/// text nodes, so the extracted text is re-parsed until it stops changing.
/// The result never contains markup that a further clean would remove.
pub fn clean_document(doc: &Html) -> String {
    clean_document_excluding(doc, NON_CONTENT_ELEMENTS)
}

/// Like [`clean_document`] with a caller-chosen set of dropped elements
pub fn clean_document_excluding(doc: &Html, excluded: &[&str]) -> String {
    let mut current = extract_text(doc, excluded);
    for _ in 0..MAX_CLEAN_PASSES {
        let next = extract_text(&Html::parse_document(&current), excluded);
        if next == current {
            return current;
        }
        current = next;
    }
    ::log::debug!("Cleaned text still changing after {} passes", MAX_CLEAN_PASSES);
    current
}

/// Every pass strictly shortens text that still changes, this only bounds
/// pathological nesting such as `&amp;amp;amp;lt;`
const MAX_CLEAN_PASSES: usize = 16;

fn extract_text(doc: &Html, excluded: &[&str]) -> String {
    // html5ever always synthesizes a <body>, the root is only a fallback
    let root = doc
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut fragments = Vec::new();
    collect_text(root, excluded, &mut fragments);
    text::normalize(&fragments.join("\n"))
}

fn collect_text<'a>(element: ElementRef<'a>, excluded: &[&str], out: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(t) => out.push(&**t),
            Node::Element(el) => {
                if excluded.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, excluded, out);
                }
            }
            _ => {}
        }
    }
}

/// Returns the trimmed contents of `<title>`, if present and non-empty
pub fn extract_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(|t| text::normalize_whitespace_in_segment(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Extracts absolute http(s) links from a document
///
/// Relative hrefs are resolved against `base`. Duplicates are removed,
/// keeping first-seen order.
pub fn extract_links(doc: &Html, base: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let links: Vec<Url> = doc
        .select(&LINK_SELECTOR)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .filter(|url| seen.insert(url.to_string()))
        .collect();

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::debug!(
            "First few links: {:?}",
            links.iter().take(5).map(Url::as_str).collect::<Vec<_>>()
        );
    }

    links
}
