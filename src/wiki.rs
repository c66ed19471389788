//! MediaWiki lookups used to enrich prompts with encyclopedia context.
//!
//! A lookup never fails past this module: transport and decode problems are
//! folded into the returned [`WikiSummary`] as an explanatory summary.

use crate::models::WikiSummary;
use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

pub const MIN_QUERY_CHARS: usize = 4;
pub const MAX_SECTIONS: usize = 3;
const SECTION_PROMPT_CHARS: usize = 500;
const THUMBNAIL_SIZE: &str = "300";

#[async_trait]
pub trait EncyclopediaGateway: Send + Sync {
    async fn lookup(&self, query: &str) -> WikiSummary;
}

#[derive(Debug, Error)]
enum LookupError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

// --- Wire types ---

#[derive(Deserialize, Debug)]
struct QueryEnvelope<T> {
    query: Option<T>,
}

#[derive(Deserialize, Debug, Default)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize, Debug)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize, Debug, Default)]
struct PagesQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Deserialize, Debug)]
struct Page {
    #[serde(default)]
    extract: String,
    thumbnail: Option<Thumbnail>,
}

#[derive(Deserialize, Debug)]
struct Thumbnail {
    source: String,
}

#[derive(Deserialize, Debug)]
struct ParseEnvelope<T> {
    parse: Option<T>,
}

#[derive(Deserialize, Debug, Default)]
struct SectionList {
    #[serde(default)]
    sections: Vec<SectionInfo>,
}

#[derive(Deserialize, Debug)]
struct SectionInfo {
    line: String,
    index: String,
}

#[derive(Deserialize, Debug, Default)]
struct SectionText {
    #[serde(default)]
    text: HashMap<String, String>,
}

// --- Client ---

pub struct MediaWikiClient {
    client: Client,
    endpoint: String,
    language: String,
}

impl MediaWikiClient {
    pub fn new(language: &str) -> Self {
        let endpoint = format!("https://{}.wikipedia.org/w/api.php", language);
        Self::with_endpoint(endpoint, language)
    }

    /// Uses an explicit API endpoint, e.g. a mirror or a local test server.
    pub fn with_endpoint(endpoint: impl Into<String>, language: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            language: language.to_string(),
        }
    }

    pub fn page_url(&self, title: &str) -> String {
        format!(
            "https://{}.wikipedia.org/wiki/{}",
            self.language,
            urlencoding::encode(&title.replace(' ', "_"))
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, LookupError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn search_title(&self, query: &str) -> Result<Option<String>, LookupError> {
        let data: QueryEnvelope<SearchQuery> = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("format", "json"),
                ("srlimit", "1"),
            ])
            .await?;
        Ok(data
            .query
            .and_then(|q| q.search.into_iter().next())
            .map(|hit| hit.title))
    }

    async fn fetch_intro(&self, title: &str) -> Result<Option<Page>, LookupError> {
        let data: QueryEnvelope<PagesQuery> = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts|pageimages"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("titles", title),
                ("format", "json"),
                ("pithumbsize", THUMBNAIL_SIZE),
            ])
            .await?;
        let pages = data.query.map(|q| q.pages).unwrap_or_default();
        Ok(pages.into_iter().find(|(id, _)| id != "-1").map(|(_, page)| page))
    }

    async fn list_sections(&self, title: &str) -> Result<Vec<SectionInfo>, LookupError> {
        let data: ParseEnvelope<SectionList> = self
            .get_json(&[
                ("action", "parse"),
                ("page", title),
                ("prop", "sections"),
                ("format", "json"),
            ])
            .await?;
        Ok(data.parse.map(|p| p.sections).unwrap_or_default())
    }

    async fn fetch_section(&self, title: &str, index: &str) -> Result<String, LookupError> {
        let data: ParseEnvelope<SectionText> = self
            .get_json(&[
                ("action", "parse"),
                ("page", title),
                ("section", index),
                ("prop", "text"),
                ("format", "json"),
            ])
            .await?;
        let html = data
            .parse
            .and_then(|mut p| p.text.remove("*"))
            .unwrap_or_default();
        Ok(html_to_text(&html))
    }

    async fn fetch_top_sections(&self, title: &str) -> IndexMap<String, String> {
        let mut sections = IndexMap::new();
        let listed = match self.list_sections(title).await {
            Ok(listed) => listed,
            Err(e) => {
                log::warn!("Could not list sections for '{}': {}", title, e);
                return sections;
            }
        };

        for section in listed.into_iter().take(MAX_SECTIONS) {
            match self.fetch_section(title, &section.index).await {
                Ok(text) => {
                    log::debug!("Fetched section '{}' ({} chars)", section.line, text.len());
                    sections.insert(section.line, text);
                }
                Err(e) => log::warn!("Skipping section '{}' of '{}': {}", section.line, title, e),
            }
        }
        sections
    }

    async fn try_lookup(&self, query: &str) -> Result<WikiSummary, LookupError> {
        let Some(title) = self.search_title(query).await? else {
            log::info!("No encyclopedia results for '{}'", query);
            return Ok(WikiSummary::informational(
                query,
                format!("No Wikipedia results found for \"{}\"", query),
            ));
        };

        let Some(page) = self.fetch_intro(&title).await? else {
            return Ok(WikiSummary::informational(
                &title,
                format!("Failed to retrieve content for \"{}\"", title),
            ));
        };

        let sections = self.fetch_top_sections(&title).await;
        Ok(WikiSummary {
            url: Some(self.page_url(&title)),
            image_url: page.thumbnail.map(|t| t.source),
            summary: page.extract,
            sections,
            title,
        })
    }
}

#[async_trait]
impl EncyclopediaGateway for MediaWikiClient {
    async fn lookup(&self, query: &str) -> WikiSummary {
        if query.trim().chars().count() < MIN_QUERY_CHARS {
            return WikiSummary::informational(
                query,
                format!(
                    "Query \"{}\" is too short for Wikipedia search. Please use at least {} characters.",
                    query, MIN_QUERY_CHARS
                ),
            );
        }

        log::info!("Looking up '{}' on {}", query, self.endpoint);
        match self.try_lookup(query).await {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("Encyclopedia lookup for '{}' failed: {}", query, e);
                WikiSummary::informational(query, format!("Error searching Wikipedia: {}", e))
            }
        }
    }
}

// --- Markup helpers ---

static DROPPED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("invalid block regex")
});
static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|tr|dd|dt)>").expect("invalid line-break regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("invalid tag regex"));
static NUMERIC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("invalid entity regex"));
static REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+\]").expect("invalid reference regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("invalid spaces regex"));

pub fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Converts section HTML to plain text: tags stripped, entities decoded,
/// whitespace collapsed, reference markers like `[12]` removed.
pub fn html_to_text(html: &str) -> String {
    let text = DROPPED_BLOCK_RE.replace_all(html, "");
    let text = LINE_BREAK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = REFERENCE_RE.replace_all(&text, "");

    text.lines()
        .map(|line| SPACES_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a lookup as context text for a prompt.
pub fn format_for_prompt(summary: &WikiSummary) -> String {
    let mut formatted = format!("*{}*\n\n{}\n\n", summary.title, summary.summary);
    for (title, content) in &summary.sections {
        if content.is_empty() {
            continue;
        }
        let excerpt: String = content.chars().take(SECTION_PROMPT_CHARS).collect();
        formatted.push_str(&format!("*{}*\n{}...\n\n", title, excerpt));
    }
    if let Some(url) = &summary.url {
        formatted.push_str(&format!("\nRead more: {}\n", url));
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_markup_and_reference_markers() {
        let html = r##"<div class="mw-parser-output"><style>.x{color:red}</style><p>The <b>Rust</b> language<sup class="reference"><a href="#cite">[1]</a></sup> is   fast.</p><p>Second&nbsp;para &amp; more[23]</p></div>"##;
        assert_eq!(html_to_text(html), "The Rust language is fast.\nSecond para & more");
    }

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(decode_entities("&lt;a&gt; &#233;t&#xE9; &quot;x&quot;"), "<a> été \"x\"");
        // &amp; is decoded last so it does not create new entities.
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn page_url_uses_underscores_and_encoding() {
        let client = MediaWikiClient::new("en");
        assert_eq!(
            client.page_url("Rust (programming language)"),
            "https://en.wikipedia.org/wiki/Rust_%28programming_language%29"
        );
    }

    #[test]
    fn prompt_format_truncates_sections_and_skips_empty_ones() {
        let mut sections = IndexMap::new();
        sections.insert("History".to_string(), "h".repeat(600));
        sections.insert("Empty".to_string(), String::new());
        let summary = WikiSummary {
            title: "Topic".into(),
            summary: "Intro.".into(),
            sections,
            url: Some("https://en.wikipedia.org/wiki/Topic".into()),
            image_url: None,
        };
        let text = format_for_prompt(&summary);
        assert!(text.starts_with("*Topic*\n\nIntro.\n\n*History*\n"));
        assert!(text.contains(&format!("{}...", "h".repeat(500))));
        assert!(!text.contains(&"h".repeat(501)));
        assert!(!text.contains("*Empty*"));
        assert!(text.ends_with("\nRead more: https://en.wikipedia.org/wiki/Topic\n"));
    }

    #[tokio::test]
    async fn short_query_returns_without_network() {
        // An unroutable endpoint proves no request is attempted.
        let client = MediaWikiClient::with_endpoint("http://127.0.0.1:9/unused", "en");
        let result = client.lookup("cat").await;
        assert_eq!(result.title, "cat");
        assert!(result.summary.contains("too short"));
        assert!(result.sections.is_empty());
        assert_eq!(result.url, None);
    }
}
