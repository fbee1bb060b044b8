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

//! URL discovery: Phase A sitemap seeding and Phase B link harvesting
//! filters. Depth accounting and dedup against a job's
//! queue/in-flight/completed/skipped sets live in `job`, since that's where
//! the relevant state lives.

pub mod links;

pub use links::{has_ignored_extension, resolve_candidate};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use url::Url;

use crate::sitemap::{parse_sitemap, SitemapEntry};

/// Walks a seed's `/sitemap.xml`, following `<sitemapindex>` nesting up to
/// `max_index_depth` levels, collecting every `<url>` entry found. Bounded
/// overall by `total_timeout`; each individual fetch is bounded by
/// `root_timeout` (depth 0) or `nested_timeout` (depth > 0).
pub struct SitemapSeeder {
    client: reqwest::Client,
    root_timeout: Duration,
    nested_timeout: Duration,
    total_timeout: Duration,
    max_index_depth: u8,
}

impl SitemapSeeder {
    pub fn new(
        client: reqwest::Client,
        root_timeout: Duration,
        nested_timeout: Duration,
        total_timeout: Duration,
        max_index_depth: u8,
    ) -> Self {
        Self {
            client,
            root_timeout,
            nested_timeout,
            total_timeout,
            max_index_depth,
        }
    }

    /// Returns whatever page URLs were found before the total timeout
    /// elapsed, possibly empty. A missing or unparseable sitemap is not an
    /// error: it just means Phase A contributes nothing for this seed.
    pub async fn seed(&self, seed: &Url) -> Vec<Url> {
        let sitemap_url = match seed.join("/sitemap.xml") {
            Ok(url) => url,
            Err(_) => return vec![],
        };

        match tokio::time::timeout(self.total_timeout, self.walk(sitemap_url, 0)).await {
            Ok(urls) => urls,
            Err(_) => {
                tracing::warn!(seed = %seed, "sitemap walk exceeded total timeout");
                vec![]
            }
        }
    }

    fn walk(&self, url: Url, depth: u8) -> Pin<Box<dyn Future<Output = Vec<Url>> + Send + '_>> {
        Box::pin(async move {
            let per_fetch_timeout = if depth == 0 {
                self.root_timeout
            } else {
                self.nested_timeout
            };

            let body = match tokio::time::timeout(per_fetch_timeout, self.fetch(&url)).await {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => {
                    tracing::debug!(url = %url, error = %e, "sitemap fetch failed");
                    return vec![];
                }
                Err(_) => {
                    tracing::debug!(url = %url, "sitemap fetch timed out");
                    return vec![];
                }
            };

            let entries = parse_sitemap(&body);
            let mut urls = Vec::new();

            for entry in entries {
                match entry {
                    SitemapEntry::Url(u) => urls.push(u),
                    SitemapEntry::Sitemap(nested) => {
                        if depth < self.max_index_depth {
                            urls.extend(self.walk(nested, depth + 1).await);
                        }
                    }
                }
            }

            urls
        })
    }

    async fn fetch(&self, url: &Url) -> anyhow::Result<String> {
        let resp = self.client.get(url.clone()).send().await?;
        let resp = resp.error_for_status()?;
        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitemap_url_is_site_root() {
        let seed = Url::parse("https://example.com/docs/guide").unwrap();
        assert_eq!(
            seed.join("/sitemap.xml").unwrap().as_str(),
            "https://example.com/sitemap.xml"
        );
    }
}
