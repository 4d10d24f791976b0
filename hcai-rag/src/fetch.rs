//! Document fetching.
//!
//! A [`DocumentFetcher`] turns a URL into a [`Document`]. [`fetch_all`] runs a
//! fetcher over a list of URLs and collects per-URL failures instead of
//! aborting, so one unreachable page never blocks the rest of the corpus.
//!
//! The HTML-to-text helpers live here unconditionally; the HTTP-backed
//! [`HttpDocumentFetcher`] requires the `web` feature.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::document::{Document, SOURCE_KEY, TITLE_KEY};
use crate::error::{RagError, Result};

/// Metadata key holding the page language from `<html lang>`.
pub const LANGUAGE_KEY: &str = "language";

static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>",
        r"|<noscript\b.*?</noscript\s*>|<head\b.*?</head\s*>",
    ))
    .expect("unreachable error: invalid hidden block pattern")
});
static BLOCK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?(?:p|div|br|li|ul|ol|h[1-6]|tr|td|th|table|section|article",
        r"|header|footer|nav|aside|main|blockquote|pre|figure|figcaption)\b[^>]*>",
    ))
    .expect("unreachable error: invalid block tag pattern")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<[^>]*>").expect("unreachable error: invalid tag pattern")
});
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>")
        .expect("unreachable error: invalid title pattern")
});
static LANG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<html\b[^>]*\blang\s*=\s*["']?([A-Za-z][A-Za-z0-9-]*)"#)
        .expect("unreachable error: invalid lang pattern")
});
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
        .expect("unreachable error: invalid entity pattern")
});
static SPACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t\u{a0}\r\x0c]+").expect("unreachable error: invalid whitespace pattern")
});

/// Phrases that mark a page as a script-required interstitial rather than content.
const INTERSTITIAL_MARKERS: [&str; 5] = [
    "enable javascript",
    "javascript is disabled",
    "javascript is required",
    "checking your browser",
    "please turn javascript on",
];

/// Pages shorter than this that mention an interstitial marker are rejected.
const INTERSTITIAL_MAX_CHARS: usize = 1_000;

/// Loads a single document from a URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url` and return its visible text as a [`Document`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::FetchError`] for transport failures, non-success
    /// statuses, and pages without usable content.
    async fn fetch(&self, url: &str) -> Result<Document>;
}

/// A URL that could not be loaded.
#[derive(Debug)]
pub struct FetchFailure {
    /// The URL that failed.
    pub url: String,
    /// Why it failed.
    pub error: RagError,
}

/// Outcome of [`fetch_all`].
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Documents loaded successfully, in input order.
    pub documents: Vec<Document>,
    /// URLs that failed, in input order.
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    /// Total characters across all loaded documents.
    pub fn total_chars(&self) -> usize {
        self.documents.iter().map(|d| d.text.chars().count()).sum()
    }
}

/// Fetch every URL in order, collecting failures rather than stopping at the first.
///
/// Loaded documents get distinct ids: when a URL maps to an id already in
/// the report, `-2`, `-3`, ... is appended.
pub async fn fetch_all<S: AsRef<str>>(fetcher: &dyn DocumentFetcher, urls: &[S]) -> FetchReport {
    let mut report = FetchReport::default();
    let mut ids = HashSet::new();
    for (i, url) in urls.iter().enumerate() {
        let url = url.as_ref();
        match fetcher.fetch(url).await {
            Ok(mut document) => {
                let id = unique_id(&mut ids, &document.id);
                if id != document.id {
                    debug!(url, from = %document.id, to = %id, "renamed colliding document id");
                    document.id = id;
                }
                info!(
                    url,
                    index = i + 1,
                    total = urls.len(),
                    chars = document.text.chars().count(),
                    "loaded document"
                );
                report.documents.push(document);
            }
            Err(e) => {
                warn!(
                    url,
                    index = i + 1,
                    total = urls.len(),
                    error = %e,
                    "failed to load document"
                );
                report.failures.push(FetchFailure { url: url.to_string(), error: e });
            }
        }
    }
    report
}

/// Claim `id` in `taken`, suffixing a counter when it is already used.
fn unique_id(taken: &mut HashSet<String>, id: &str) -> String {
    if taken.insert(id.to_string()) {
        return id.to_string();
    }
    (2usize..)
        .map(|n| format!("{id}-{n}"))
        .find(|candidate| taken.insert(candidate.clone()))
        .unwrap_or_else(|| id.to_string())
}

/// Visible content extracted from an HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Visible text, one block per line.
    pub text: String,
    /// Contents of `<title>`, if present.
    pub title: Option<String>,
    /// Language from `<html lang>`, if present.
    pub language: Option<String>,
}

/// Strip markup from `html`, keeping the visible text.
///
/// Script, style, noscript and head blocks are dropped; block-level tags
/// become line breaks; entities are decoded; runs of spaces collapse and
/// blank lines are removed.
pub fn extract_html(html: &str) -> ExtractedPage {
    let title = TITLE
        .captures(html)
        .map(|c| collapse_spaces(&decode_entities(&ANY_TAG.replace_all(&c[1], " "))))
        .filter(|t| !t.is_empty());
    let language = LANG.captures(html).map(|c| c[1].to_string());

    let visible = HIDDEN_BLOCKS.replace_all(html, " ");
    let visible = BLOCK_TAGS.replace_all(&visible, "\n");
    let visible = ANY_TAG.replace_all(&visible, " ");
    let visible = decode_entities(&visible);

    let text = visible
        .lines()
        .map(collapse_spaces)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    ExtractedPage { text, title, language }
}

/// Whether extracted text is a "please enable JavaScript" style placeholder.
pub fn is_interstitial(text: &str) -> bool {
    if text.chars().count() > INTERSTITIAL_MAX_CHARS {
        return false;
    }
    let lower = text.to_lowercase();
    INTERSTITIAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Build a document id from a URL: its last path segment, else its host.
pub fn document_id_for_url(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let host = segments.next().unwrap_or_default();
    let last = segments.next_back().unwrap_or(host);
    let last = match last.rsplit_once('.') {
        Some((stem, "html" | "htm" | "php" | "aspx")) if !stem.is_empty() => stem,
        _ => last,
    };

    let id: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let id = id.trim_matches('-');
    if id.is_empty() { "document".to_string() } else { id.to_string() }
}

/// Turn fetched HTML into a [`Document`], rejecting empty and interstitial pages.
///
/// # Errors
///
/// Returns [`RagError::FetchError`] when the page has no usable text.
pub fn document_from_html(url: &str, html: &str) -> Result<Document> {
    let page = extract_html(html);
    if page.text.is_empty() {
        return Err(RagError::FetchError {
            url: url.to_string(),
            message: "page has no visible text".into(),
        });
    }
    if is_interstitial(&page.text) {
        return Err(RagError::FetchError {
            url: url.to_string(),
            message: "page requires JavaScript to render its content".into(),
        });
    }

    let mut metadata = HashMap::from([(SOURCE_KEY.to_string(), url.to_string())]);
    if let Some(title) = page.title {
        metadata.insert(TITLE_KEY.to_string(), title);
    }
    if let Some(language) = page.language {
        metadata.insert(LANGUAGE_KEY.to_string(), language);
    }
    Ok(Document::manual(document_id_for_url(url), page.text, metadata))
}

fn collapse_spaces(text: &str) -> String {
    SPACES.replace_all(text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                "rsquo" | "lsquo" => Some('\''),
                "rdquo" | "ldquo" => Some('"'),
                "hellip" => Some('\u{2026}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(feature = "web")]
pub use http::HttpDocumentFetcher;

#[cfg(feature = "web")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::debug;

    use super::{DocumentFetcher, document_from_html};
    use crate::document::Document;
    use crate::error::{RagError, Result};

    /// Browser-like user agent; several publishers refuse unknown clients.
    const USER_AGENT: &str = concat!(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/126.0 Safari/537.36"
    );

    /// Fetches pages over HTTP and extracts their visible text.
    #[derive(Debug, Clone)]
    pub struct HttpDocumentFetcher {
        client: reqwest::Client,
    }

    impl HttpDocumentFetcher {
        /// Create a fetcher whose requests time out after `timeout`.
        ///
        /// # Errors
        ///
        /// Returns [`RagError::ConfigError`] if the HTTP client cannot be built.
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl DocumentFetcher for HttpDocumentFetcher {
        async fn fetch(&self, url: &str) -> Result<Document> {
            let fetch_error =
                |message: String| RagError::FetchError { url: url.to_string(), message };

            let response =
                self.client.get(url).send().await.map_err(|e| fetch_error(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(fetch_error(format!("server returned {status}")));
            }

            let html = response.text().await.map_err(|e| fetch_error(e.to_string()))?;
            debug!(url, bytes = html.len(), "fetched page");
            document_from_html(url, &html)
        }
    }
}
