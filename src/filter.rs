use crate::config::SummaryConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Links to static assets never carry readable page content.
/// Matched against the URL path, so query strings and fragments don't hide them.
pub const ASSET_PATTERN: &str =
    r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|svg|woff|woff2|ttf|eot|pdf|zip|mp4|mp3)$";

static ASSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ASSET_PATTERN).expect("static asset pattern"));

/// Configuration for deciding which discovered links are followed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFilterConfig {
    /// Whether links to other domains may be followed
    #[serde(default)]
    pub allow_external: bool,

    /// Domain links must belong to (ignored when allow_external is set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_domain: Option<String>,

    /// Regex patterns for links to include (if empty, all links are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for links to exclude (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for LinkFilterConfig {
    fn default() -> Self {
        Self {
            allow_external: false,
            required_domain: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Link filter that uses regex patterns and domain scope to pick links worth fetching
#[derive(Debug)]
pub struct LinkFilter {
    config: LinkFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl LinkFilter {
    /// Create a new link filter from configuration
    pub fn new(config: LinkFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Build the filter for a seed URL from summary settings
    pub fn for_seed(seed: &Url, settings: &SummaryConfig) -> Result<Self, regex::Error> {
        Self::new(LinkFilterConfig {
            allow_external: settings.allow_external,
            required_domain: if settings.allow_external {
                None
            } else {
                seed.host_str().map(|h| h.to_string())
            },
            include_patterns: settings.include_patterns.clone(),
            exclude_patterns: settings.exclude_patterns.clone(),
        })
    }

    /// Determine if a link should be followed based on all filtering rules
    pub fn should_follow(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_domain_scope(url) {
            return false;
        }

        if ASSET_REGEX.is_match(url.path()) {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(url_str))
    }

    /// Narrow discovered links down to distinct, followable pages
    ///
    /// `fetched` holds the URLs already read (the seed as requested and,
    /// after a redirect, where it ended up); links to them are skipped.
    pub fn candidates(&self, fetched: &[&Url], links: &[Url]) -> Vec<Url> {
        let mut seen: HashSet<String> = fetched
            .iter()
            .map(|url| self.normalize_url(url).to_string())
            .collect();

        let mut accepted = Vec::new();
        for link in links {
            if !self.should_follow(link) {
                ::log::debug!("Link filter rejected: {}", link);
                continue;
            }
            let normalized = self.normalize_url(link);
            if seen.insert(normalized.to_string()) {
                ::log::debug!("Link filter accepted: {}", normalized);
                accepted.push(normalized);
            }
        }
        accepted
    }

    /// Check if a URL is within the allowed domain scope
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        if self.config.allow_external {
            return true;
        }

        match (&self.config.required_domain, url.host_str()) {
            (Some(required), Some(host)) => host.eq_ignore_ascii_case(required),
            _ => false,
        }
    }

    /// Create a normalized version of the URL (fragment removed)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_filter_rejects_everything_without_domain() {
        let filter = LinkFilter::new(LinkFilterConfig::default()).unwrap();
        assert!(!filter.should_follow(&url("https://example.com/page.html")));
    }

    #[test]
    fn test_assets_excluded() {
        let filter = LinkFilter::for_seed(&url("https://example.com/"), &SummaryConfig::default())
            .unwrap();
        assert!(!filter.should_follow(&url("https://example.com/logo.PNG")));
        assert!(!filter.should_follow(&url("https://example.com/brochure.pdf")));
        assert!(!filter.should_follow(&url("https://example.com/logo.png?v=2")));
        assert!(!filter.should_follow(&url("https://example.com/brochure.pdf?dl=1")));
        assert!(!filter.should_follow(&url("https://example.com/app.js#main")));
        assert!(filter.should_follow(&url("https://example.com/about")));
        assert!(filter.should_follow(&url("https://example.com/search?file=report.pdf")));
    }

    #[test]
    fn test_domain_restriction() {
        let filter = LinkFilter::for_seed(&url("https://example.com/"), &SummaryConfig::default())
            .unwrap();
        assert!(filter.should_follow(&url("https://EXAMPLE.com/team")));
        assert!(!filter.should_follow(&url("https://other.com/page")));
        assert!(!filter.should_follow(&url("https://blog.example.com/page")));
    }

    #[test]
    fn test_external_allowed() {
        let settings = SummaryConfig {
            allow_external: true,
            ..SummaryConfig::default()
        };
        let filter = LinkFilter::for_seed(&url("https://example.com/"), &settings).unwrap();
        assert!(filter.should_follow(&url("https://other.com/page")));
        assert!(!filter.should_follow(&url("https://other.com/style.css")));
    }

    #[test]
    fn test_regex_patterns() {
        let settings = SummaryConfig {
            include_patterns: vec![r"/(about|services)".to_string()],
            exclude_patterns: vec![r"/services/legacy".to_string()],
            ..SummaryConfig::default()
        };
        let filter = LinkFilter::for_seed(&url("https://example.com/"), &settings).unwrap();
        assert!(filter.should_follow(&url("https://example.com/about")));
        assert!(filter.should_follow(&url("https://example.com/services/fleet")));
        assert!(!filter.should_follow(&url("https://example.com/blog")));
        assert!(!filter.should_follow(&url("https://example.com/services/legacy/x")));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let settings = SummaryConfig {
            include_patterns: vec!["(unclosed".to_string()],
            ..SummaryConfig::default()
        };
        assert!(LinkFilter::for_seed(&url("https://example.com/"), &settings).is_err());
    }

    #[test]
    fn test_candidates_dedup_and_skip_seed() {
        let seed = url("https://example.com/#top");
        let filter = LinkFilter::for_seed(&seed, &SummaryConfig::default()).unwrap();
        let links = vec![
            url("https://example.com/"),
            url("https://example.com/about#team"),
            url("https://example.com/about"),
            url("https://other.com/"),
            url("https://example.com/careers"),
        ];
        let candidates: Vec<String> = filter
            .candidates(&[&seed], &links)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            candidates,
            vec!["https://example.com/about", "https://example.com/careers"]
        );
    }

    #[test]
    fn test_candidates_skip_redirect_target() {
        let seed = url("https://example.com/");
        let landed = url("https://example.com/home");
        let filter = LinkFilter::for_seed(&seed, &SummaryConfig::default()).unwrap();
        let links = vec![url("https://example.com/home"), url("https://example.com/about")];
        let candidates = filter.candidates(&[&seed, &landed], &links);
        assert_eq!(candidates, vec![url("https://example.com/about")]);
    }
}
