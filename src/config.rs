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

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::canonical::ScopeMode;

pub mod defaults {
    pub fn num_workers() -> usize {
        5
    }

    pub fn strict_path() -> bool {
        true
    }

    pub fn stable_query() -> bool {
        true
    }

    pub fn inter_request_delay_ms() -> u64 {
        500
    }

    pub fn follow_external() -> bool {
        false
    }

    pub fn max_external_hops() -> u8 {
        1
    }

    pub fn sitemap_root_timeout_secs() -> u64 {
        10
    }

    pub fn sitemap_nested_timeout_secs() -> u64 {
        5
    }

    pub fn sitemap_total_timeout_secs() -> u64 {
        30
    }

    pub fn sitemap_max_index_depth() -> u8 {
        2
    }

    pub fn render_wait_budget_ms() -> u64 {
        10_000
    }

    pub fn render_content_stability_budget_ms() -> u64 {
        10_000
    }

    pub fn render_wall_clock_cap_secs() -> u64 {
        60
    }

    pub fn max_render_attempts() -> u32 {
        3
    }

    pub fn retry_backoff_ms() -> u64 {
        1_000
    }

    pub fn error_log_retention_days() -> i64 {
        30
    }

    pub fn error_log_max_entries() -> usize {
        500
    }

    pub fn store_path() -> PathBuf {
        PathBuf::from("sitecapture.redb")
    }
}

/// Top-level configuration, TOML-deserializable. Every field pinned to a
/// default number below carries that number as its `serde(default)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Size of the render slot pool. Clamped to [1,10].
    pub num_workers: usize,
    /// Per-seed page cap. `None` means unlimited.
    pub page_limit_per_seed: Option<u32>,
    /// Scope match mode.
    pub strict_path: bool,
    /// Sort canonicalized query keys lexicographically.
    pub stable_query: bool,
    /// Skip the cross-job cached-render lookup in the worker loop.
    pub skip_cache: bool,
    /// Render in an incognito/ephemeral browser context.
    pub use_incognito: bool,
    /// Allow following links outside every seed's scope.
    pub follow_external: bool,
    /// Max out-of-scope hop count.
    pub max_external_hops: u8,
    /// Politeness delay applied per worker, outside the render call.
    pub inter_request_delay_ms: u64,
    pub sitemap: SitemapConfig,
    pub render: RenderConfig,
    pub error_log: ErrorLogConfig,
    /// Path to the embedded `redb` document store.
    pub store_path: PathBuf,
    /// Base URL of the Browserless-compatible rendering service.
    pub browserless_base_url: String,
    pub browserless_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub root_timeout_secs: u64,
    pub nested_timeout_secs: u64,
    pub total_timeout_secs: u64,
    pub max_index_depth: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub wait_budget_ms: u64,
    pub content_stability_budget_ms: u64,
    pub wall_clock_cap_secs: u64,
    /// Total attempts (including the first) before a URL counts as failed.
    pub max_render_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorLogConfig {
    pub retention_days: i64,
    pub max_entries: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            num_workers: defaults::num_workers(),
            page_limit_per_seed: None,
            strict_path: defaults::strict_path(),
            stable_query: defaults::stable_query(),
            skip_cache: false,
            use_incognito: false,
            follow_external: defaults::follow_external(),
            max_external_hops: defaults::max_external_hops(),
            inter_request_delay_ms: defaults::inter_request_delay_ms(),
            sitemap: SitemapConfig::default(),
            render: RenderConfig::default(),
            error_log: ErrorLogConfig::default(),
            store_path: defaults::store_path(),
            browserless_base_url: "http://localhost:3000".to_string(),
            browserless_token: None,
        }
    }
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            root_timeout_secs: defaults::sitemap_root_timeout_secs(),
            nested_timeout_secs: defaults::sitemap_nested_timeout_secs(),
            total_timeout_secs: defaults::sitemap_total_timeout_secs(),
            max_index_depth: defaults::sitemap_max_index_depth(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            wait_budget_ms: defaults::render_wait_budget_ms(),
            content_stability_budget_ms: defaults::render_content_stability_budget_ms(),
            wall_clock_cap_secs: defaults::render_wall_clock_cap_secs(),
            max_render_attempts: defaults::max_render_attempts(),
            retry_backoff_ms: defaults::retry_backoff_ms(),
        }
    }
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            retention_days: defaults::error_log_retention_days(),
            max_entries: defaults::error_log_max_entries(),
        }
    }
}

impl CaptureConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: '{}'", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config: '{}'", path.display()))?;
        config.num_workers = config.num_workers.clamp(1, 10);
        config.max_external_hops = config.max_external_hops.clamp(1, 5);
        Ok(config)
    }

    pub fn scope_mode(&self) -> ScopeMode {
        if self.strict_path {
            ScopeMode::Strict
        } else {
            ScopeMode::Loose
        }
    }
}
