// sitecapture is a website capture engine.
// Copyright (C) 2026 sitecapture contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! A `RenderSlot` backed by a Browserless-compatible HTTP rendering
//! service. This is one possible implementation of the render contract, not
//! part of it; any JS-capable fetcher could sit behind the same trait.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    DiscoveredLink, MetadataRecord, RenderError, RenderErrorKind, RenderOptions, RenderResult,
    RenderSlot,
};

pub struct BrowserlessRenderSlot {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessRenderSlot {
    pub fn new(base_url: &str, token: Option<&str>, wall_clock_cap: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(wall_clock_cap)
            .build()
            .expect("failed to build render http client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn content_endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }
}

#[async_trait]
impl RenderSlot for BrowserlessRenderSlot {
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<RenderResult, RenderError> {
        let body = serde_json::json!({
            "url": url,
            "gotoOptions": { "waitUntil": "networkidle2", "timeout": opts.wait_budget_ms },
            "bestAttempt": true,
            "stealth": opts.use_incognito,
        });

        let resp = self
            .client
            .post(self.content_endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RenderError {
                kind: if status.as_u16() == 408 {
                    RenderErrorKind::LoadTimeout
                } else {
                    RenderErrorKind::NavigationFailed
                },
                message: format!("browserless returned {status}: {message}"),
                retryable: status.is_server_error(),
            });
        }

        let html = resp.text().await.map_err(|e| network_error(url, &e))?;

        Ok(extract(&html, url))
    }
}

fn network_error(url: &str, err: &reqwest::Error) -> RenderError {
    RenderError {
        kind: if err.is_timeout() {
            RenderErrorKind::LoadTimeout
        } else {
            RenderErrorKind::Internal
        },
        message: format!("failed to render {url}: {err}"),
        retryable: !err.is_timeout(),
    }
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static SCRIPT_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</\1>").unwrap());
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<(?:a|area)\b[^>]*\bhref\s*=\s*["']([^"']+)["']"#).unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)<meta\s+([^>]*?)(?:/?)>"#).unwrap());
static META_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)([a-zA-Z-]+)\s*=\s*["']([^"']*)["']"#).unwrap());
static CANONICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<link\s+[^>]*rel\s*=\s*["']canonical["'][^>]*href\s*=\s*["']([^"']+)["']"#)
        .unwrap()
});

/// Extracts text, metadata, and links from rendered HTML via regex scanning.
/// A production deployment would plug a real HTML-to-text/markdown crate in
/// here; this keeps the contract's shape while staying dependency-light.
fn extract(html: &str, base_url: &str) -> RenderResult {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, " ");
    let text_raw = TAG_RE.replace_all(&without_scripts, " ");
    let text = normalize_whitespace(&html_unescape(&text_raw));

    let links = extract_links(html, base_url);
    let metadata = extract_metadata(html);

    RenderResult {
        html: Some(html.to_string()),
        text,
        metadata: Some(metadata),
        markdown: None,
        markdown_meta: None,
        links,
    }
}

pub(crate) fn extract_links(html: &str, base_url: &str) -> Vec<DiscoveredLink> {
    let base = url::Url::parse(base_url).ok();

    LINK_RE
        .captures_iter(html)
        .filter_map(|cap| {
            let raw = html_unescape(&cap[1]);
            let resolved = match &base {
                Some(b) => b.join(&raw).ok(),
                None => url::Url::parse(&raw).ok(),
            }?;
            Some(DiscoveredLink {
                url: resolved.to_string(),
                depth: 0,
            })
        })
        .collect()
}

fn extract_metadata(html: &str) -> MetadataRecord {
    let mut record = MetadataRecord::default();

    if let Some(cap) = TITLE_RE.captures(html) {
        record.title = Some(normalize_whitespace(&html_unescape(&cap[1])));
    }

    if let Some(cap) = CANONICAL_RE.captures(html) {
        record.canonical = Some(html_unescape(&cap[1]));
    }

    for meta in META_RE.captures_iter(html) {
        let attrs_str = &meta[1];
        let mut name = None;
        let mut property = None;
        let mut content = None;

        for attr in META_ATTR_RE.captures_iter(attrs_str) {
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = Some(attr[2].to_string()),
                "property" => property = Some(attr[2].to_string()),
                "content" => content = Some(html_unescape(&attr[2])),
                _ => {}
            }
        }

        let Some(content) = content else { continue };

        match name.as_deref() {
            Some("description") => record.description = Some(content.clone()),
            Some("keywords") => {
                record.keywords = content.split(',').map(|k| k.trim().to_string()).collect()
            }
            Some("author") => record.author = Some(content.clone()),
            Some("article:section") => record.article_section = Some(content.clone()),
            Some("article:tag") => record.article_tags.push(content.clone()),
            _ => {}
        }

        if let Some(property) = property {
            if let Some(og) = property.strip_prefix("og:") {
                record.open_graph.insert(og.to_string(), content);
            }
        }
    }

    record
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn html_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_and_strips_scripts() {
        let html = r#"<html><head><script>evil()</script></head>
            <body><h1>Hello &amp; welcome</h1><p>World</p></body></html>"#;
        let result = extract(html, "https://example.com/");
        assert_eq!(result.text, "Hello & welcome World");
    }

    #[test]
    fn extracts_links_in_order() {
        let html = r#"<a href="/a">A</a><area href="/b"><a href="https://other.com/c">C</a>"#;
        let links = extract_links(html, "https://example.com/docs");
        let urls: Vec<_> = links.into_iter().map(|l| l.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a",
                "https://example.com/b",
                "https://other.com/c",
            ]
        );
    }

    #[test]
    fn extracts_metadata() {
        let html = r#"<head>
            <title>My Page</title>
            <meta name="description" content="a page">
            <meta property="og:title" content="OG title">
            <link rel="canonical" href="https://example.com/canonical">
            </head>"#;
        let meta = extract_metadata(html);
        assert_eq!(meta.title, Some("My Page".to_string()));
        assert_eq!(meta.description, Some("a page".to_string()));
        assert_eq!(meta.canonical, Some("https://example.com/canonical".to_string()));
        assert_eq!(meta.open_graph.get("title"), Some(&"OG title".to_string()));
    }
}
