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

//! A deterministic, configurable `RenderSlot` for driving scenario tests
//! without a network-backed substrate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{DiscoveredLink, MetadataRecord, RenderError, RenderOptions, RenderResult};

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub text: String,
    pub links: Vec<&'static str>,
    pub title: Option<&'static str>,
    /// If set, `render` sleeps this long before resolving — used to exercise
    /// the wait/cancel paths.
    pub delay: Option<Duration>,
    /// If set, `render` returns this error instead of a result.
    pub error: Option<RenderError>,
}

impl MockPage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_links(mut self, links: Vec<&'static str>) -> Self {
        self.links = links;
        self
    }

    pub fn with_title(mut self, title: &'static str) -> Self {
        self.title = Some(title);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(error: RenderError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Maps exact URL strings to canned responses. Unknown URLs resolve to an
/// empty page with no links rather than erroring, matching how a real
/// renderer would happily render an empty document.
#[derive(Default)]
pub struct MockRenderSlot {
    pages: Mutex<HashMap<String, MockPage>>,
    calls: Mutex<Vec<String>>,
}

impl MockRenderSlot {
    pub fn new(pages: HashMap<String, MockPage>) -> Self {
        Self {
            pages: Mutex::new(pages),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn insert(&self, url: impl Into<String>, page: MockPage) {
        self.pages.lock().unwrap().insert(url.into(), page);
    }
}

#[async_trait]
impl super::RenderSlot for MockRenderSlot {
    async fn render(&self, url: &str, _opts: &RenderOptions) -> Result<RenderResult, RenderError> {
        self.calls.lock().unwrap().push(url.to_string());

        let page = self.pages.lock().unwrap().get(url).cloned();

        let page = match page {
            Some(page) => page,
            None => MockPage::default(),
        };

        if let Some(delay) = page.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = page.error {
            return Err(error);
        }

        let links = page
            .links
            .iter()
            .map(|l| DiscoveredLink {
                url: l.to_string(),
                depth: 0,
            })
            .collect();

        Ok(RenderResult {
            html: Some(format!("<html><body>{}</body></html>", page.text)),
            text: page.text,
            metadata: Some(MetadataRecord {
                title: page.title.map(String::from),
                ..Default::default()
            }),
            markdown: None,
            markdown_meta: None,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderSlot;

    fn opts() -> RenderOptions {
        RenderOptions {
            wait_budget_ms: 1000,
            content_stability_budget_ms: 500,
            use_incognito: false,
        }
    }

    #[tokio::test]
    async fn returns_configured_page() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://example.com/".to_string(),
            MockPage::text("hello").with_links(vec!["https://example.com/a"]),
        );
        let slot = MockRenderSlot::new(pages);

        let result = slot.render("https://example.com/", &opts()).await.unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.links.len(), 1);
        assert_eq!(slot.calls(), vec!["https://example.com/"]);
    }

    #[tokio::test]
    async fn unknown_url_renders_empty() {
        let slot = MockRenderSlot::new(HashMap::new());
        let result = slot.render("https://example.com/x", &opts()).await.unwrap();
        assert_eq!(result.text, "");
        assert!(result.links.is_empty());
    }

    #[tokio::test]
    async fn propagates_configured_error() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://example.com/bad".to_string(),
            MockPage::failing(RenderError {
                kind: crate::render::RenderErrorKind::NavigationFailed,
                message: "boom".to_string(),
                retryable: true,
            }),
        );
        let slot = MockRenderSlot::new(pages);

        let err = slot.render("https://example.com/bad", &opts()).await.unwrap_err();
        assert!(err.retryable);
    }
}
