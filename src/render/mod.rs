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

//! The render contract and the fixed-size slot pool.
//! `RenderSlot` is the seam where a real browser-automation substrate
//! (headless Chrome, a JS-capable fetcher) plugs in; the core makes no
//! assumption about what's behind it.

mod browserless;
mod pool;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use browserless::BrowserlessRenderSlot;
pub(crate) use browserless::extract_links;
pub use pool::{SlotGuard, SlotPool};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub wait_budget_ms: u64,
    pub content_stability_budget_ms: u64,
    pub use_incognito: bool,
}

/// A link discovered in the rendered DOM, in DOM order. `depth` is whatever
/// nesting hint the render substrate reports (e.g. iframe nesting); it is
/// informational only — the orchestrator computes its own scheduling depth
/// independent of this field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredLink {
    pub url: String,
    pub depth: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub canonical: Option<String>,
    pub keywords: Vec<String>,
    pub author: Option<String>,
    pub open_graph: std::collections::BTreeMap<String, String>,
    pub json_ld: Vec<serde_json::Value>,
    pub article_section: Option<String>,
    pub article_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownMeta {
    pub confidence: f64,
    pub h2_count: u32,
    pub has_tables: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    /// Absent when the render was served from cache (`Page.html`).
    pub html: Option<String>,
    pub text: String,
    pub metadata: Option<MetadataRecord>,
    pub markdown: Option<String>,
    pub markdown_meta: Option<MarkdownMeta>,
    pub links: Vec<DiscoveredLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderErrorKind {
    LoadTimeout,
    NavigationFailed,
    ScriptError,
    Cancelled,
    Internal,
}

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl RenderError {
    pub fn cancelled() -> Self {
        Self {
            kind: RenderErrorKind::Cancelled,
            message: "render cancelled".to_string(),
            retryable: false,
        }
    }
}

/// One call per URL. The slot must not be reused for a different URL until
/// this call resolves or is cancelled.
#[async_trait]
pub trait RenderSlot: Send + Sync {
    async fn render(&self, url: &str, opts: &RenderOptions) -> Result<RenderResult, RenderError>;

    /// Tears down whatever context this slot holds. Called once, when the
    /// pool is shut down. Default is a no-op for stateless slots.
    async fn close(&self) {}
}
