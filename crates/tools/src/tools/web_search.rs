//! `web_search`: parses DuckDuckGo Lite's HTML result page.
//!
//! The search provider is not contractual (`spec.md` §9 Open Questions);
//! this concrete HTML parser is adopted as the default implementation per
//! `SPEC_FULL.md`'s supplemented-features section.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

fn default_max_results() -> u32 {
    5
}
fn default_timeout() -> f64 {
    10.0
}

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: u32,
    #[serde(default)]
    site: Option<String>,
    #[serde(default = "default_timeout")]
    timeout_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_url: Option<String>,
}

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<a\s+[^>]*>(.*?)</a>"#).unwrap());
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<td[^>]*class="result-snippet"[^>]*>(.*?)</td>"#).unwrap()
});
static LINK_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<span[^>]*class="link-text"[^>]*>(.*?)</span>"#).unwrap());

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web and return a short list of ranked results with titles, URLs, and snippets."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1, "maxLength": 500},
                "max_results": {"type": "integer", "minimum": 1, "maximum": 10, "default": 5},
                "site": {"type": "string", "maxLength": 255},
                "timeout_seconds": {"type": "number", "minimum": 0.25, "maximum": 30, "default": 10.0},
            },
            "required": ["query"],
        })
    }

    fn limitations(&self) -> &'static str {
        "Returns at most 10 results; no pagination; provider is HTML-scraped and may rate-limit."
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let mut args: WebSearchArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArgs { tool: self.name().to_string(), reason: e.to_string() })?;
        args.query.truncate(500);
        args.max_results = args.max_results.clamp(1, 10);
        args.timeout_seconds = args.timeout_seconds.clamp(0.25, 30.0);

        let query = match &args.site {
            Some(site) if !site.trim().is_empty() => format!("site:{site} {}", args.query),
            _ => args.query.clone(),
        };

        let html = fetch_lite_html(&self.client, &query, args.timeout_seconds).await?;
        let results = parse_results(&html, args.max_results as usize);

        Ok(json!({ "results": results }))
    }
}

async fn fetch_lite_html(
    client: &reqwest::Client,
    query: &str,
    timeout_seconds: f64,
) -> Result<String, ToolError> {
    let response = client
        .get("https://lite.duckduckgo.com/lite/")
        .query(&[("q", query)])
        .header(
            "User-Agent",
            "Mozilla/5.0 (compatible; WorkflowRunEngine/0.1; +https://example.invalid)",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .timeout(std::time::Duration::from_secs_f64(timeout_seconds))
        .send()
        .await
        .map_err(|e| ToolError::Network(e.to_string()))?;

    response
        .text()
        .await
        .map_err(|e| ToolError::Network(e.to_string()))
}

fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let mut seen_urls = std::collections::HashSet::new();

    // Result-link anchors in document order, with their byte ranges, so each
    // result's snippet/result-url cells (which follow in subsequent table
    // rows) can be scoped to the window before the *next* result-link
    // anchor rather than bleeding into later results.
    let anchors: Vec<_> = ANCHOR_RE
        .captures_iter(html)
        .filter(|caps| caps[0].contains("result-link"))
        .collect();

    for (idx, anchor_caps) in anchors.iter().enumerate() {
        if results.len() >= max_results {
            break;
        }
        let full_tag = &anchor_caps[0];
        let Some(href_caps) = HREF_RE.captures(full_tag) else {
            continue;
        };
        let href = decode_duckduckgo_url(&href_caps[1]);
        if !seen_urls.insert(href.clone()) {
            continue;
        }

        let inner = &anchor_caps[1];
        let title = strip_html(inner);
        if title.is_empty() {
            continue;
        }

        let window_start = anchor_caps.get(0).map_or(0, |m| m.end());
        let window_end = anchors
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let window = &html[window_start..window_end];

        let snippet = SNIPPET_RE
            .captures(window)
            .map(|caps| strip_html(&caps[1]))
            .filter(|s| !s.is_empty());
        let display_url = LINK_TEXT_RE
            .captures(window)
            .map(|caps| strip_html(&caps[1]))
            .filter(|s| !s.is_empty());

        results.push(SearchResult {
            title,
            url: href,
            snippet,
            display_url,
        });
    }

    results
}

fn strip_html(fragment: &str) -> String {
    let no_tags = TAG_RE.replace_all(fragment, "");
    html_unescape(no_tags.trim())
}

fn html_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a DuckDuckGo Lite redirect URL: protocol-relative `//` links get
/// an `https:` prefix; `uddg=` query params are URL-decoded to the real
/// destination.
fn decode_duckduckgo_url(raw: &str) -> String {
    let unescaped = html_unescape(raw.trim());
    let with_scheme = if let Some(rest) = unescaped.strip_prefix("//") {
        format!("https:{rest}")
    } else {
        unescaped
    };

    if let Ok(url) = url::Url::parse(&with_scheme) {
        if let Some((_, uddg)) = url.query_pairs().find(|(k, _)| k == "uddg") {
            return uddg.into_owned();
        }
    }
    with_scheme
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_link_anchors() {
        let html = r#"
            <a class="result-link" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage">Example Page</a>
            <a class="unrelated" href="https://tracker.example/x">Ignore me</a>
        "#;
        let results = parse_results(html, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Example Page");
        assert_eq!(results[0].url, "https://example.com/page");
    }

    #[test]
    fn dedupes_by_url() {
        let html = r#"
            <a class="result-link" href="https://example.com/page">First</a>
            <a class="result-link" href="https://example.com/page">Second</a>
        "#;
        let results = parse_results(html, 5);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn respects_max_results() {
        let html = (0..10)
            .map(|i| format!(r#"<a class="result-link" href="https://example.com/{i}">Title {i}</a>"#))
            .collect::<Vec<_>>()
            .join("\n");
        let results = parse_results(&html, 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn empty_title_is_skipped() {
        let html = r#"<a class="result-link" href="https://example.com/x">   </a>"#;
        assert!(parse_results(html, 5).is_empty());
    }

    #[test]
    fn parses_snippet_and_display_url_from_following_rows() {
        let html = r#"
            <tr><td class="result-link"><a class="result-link" href="https://example.com/page">Example Page</a></td></tr>
            <tr><td class="result-snippet">A short summary of the page. <a href="https://example.com/page">Example Page</a></td></tr>
            <tr><td class="result-url"><span class="link-text">example.com/page</span></td></tr>
        "#;
        let results = parse_results(html, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].snippet.as_deref(),
            Some("A short summary of the page. Example Page")
        );
        assert_eq!(results[0].display_url.as_deref(), Some("example.com/page"));
    }

    #[test]
    fn snippet_window_does_not_bleed_into_next_result() {
        let html = r#"
            <a class="result-link" href="https://example.com/a">First</a>
            <td class="result-snippet">Summary for first</td>
            <a class="result-link" href="https://example.com/b">Second</a>
            <td class="result-snippet">Summary for second</td>
        "#;
        let results = parse_results(html, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].snippet.as_deref(), Some("Summary for first"));
        assert_eq!(results[1].snippet.as_deref(), Some("Summary for second"));
    }
}
