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

//! The programmatic capability surface — one dispatch point a
//! UI, CLI, or agentic-protocol façade can all sit behind. Each method here
//! is a thin, fully-typed wrapper over `job::CaptureManager`, `Store`, and
//! `diagnostics::ErrorLogger`; none of it carries scheduling logic of its
//! own.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticsReport, ErrorLogger, ReportFormat};
use crate::error::{Error, Result};
use crate::job::manager::CrawlStatus;
use crate::job::{CaptureManager, JobHandle};
use crate::store::{ErrorLog, Page, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvertFormat {
    Text,
    Markdown,
    Json,
}

/// `convert_to_format`'s result. `fallback`/`reason` are set only when the
/// requested format couldn't be honored as asked and a weaker one was
/// substituted (e.g. markdown requested but under-confidence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResult {
    pub format: ConvertFormat,
    pub content: String,
    pub fallback: Option<ConvertFormat>,
    pub reason: Option<String>,
}

/// `export_as_archive`'s result: a single base64-encoded blob plus enough
/// metadata for a caller to write it straight to disk or a response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveResult {
    pub content: String,
    pub mime_type: String,
    pub encoding: String,
    pub size: usize,
    pub filename: String,
}

pub struct Capability {
    manager: Arc<CaptureManager>,
    store: Arc<dyn Store>,
    logger: Arc<ErrorLogger>,
}

impl Capability {
    pub fn new(manager: Arc<CaptureManager>, store: Arc<dyn Store>, logger: Arc<ErrorLogger>) -> Self {
        Self {
            manager,
            store,
            logger,
        }
    }

    pub async fn crawl_start(&self, seeds: Vec<String>) -> Result<JobHandle> {
        self.manager.start(seeds).await
    }

    pub async fn crawl_status(&self, job_id: &str) -> Result<CrawlStatus> {
        self.manager.status(job_id).await
    }

    pub async fn crawl_cancel(&self, job_id: &str) -> Result<()> {
        self.manager.cancel(job_id).await
    }

    pub async fn crawl_resume(&self, job_id: &str) -> Result<JobHandle> {
        self.manager.resume(job_id).await
    }

    pub async fn pages_list(&self, job_id: &str) -> Result<Vec<Page>> {
        self.store.get_pages_by_job_id(job_id).await
    }

    pub async fn pages_search(&self, job_id: &str, query: &str) -> Result<Vec<Page>> {
        self.store.search_pages_by_url_substring(job_id, query).await
    }

    /// Renders one page's stored content in the requested format. `Text`
    /// always returns the stored text. `Markdown` falls back to `Text` when
    /// the page never produced markdown, or when its markdown confidence is
    /// below `confidence_threshold` — either way `fallback`/`reason` report
    /// why. `Json` serializes the whole page, omitting `metadata` unless
    /// `include_metadata` is set.
    pub fn convert_to_format(
        &self,
        page: &Page,
        format: ConvertFormat,
        confidence_threshold: f64,
        include_metadata: bool,
    ) -> Result<ConvertResult> {
        match format {
            ConvertFormat::Text => Ok(ConvertResult {
                format: ConvertFormat::Text,
                content: page.text.clone(),
                fallback: None,
                reason: None,
            }),
            ConvertFormat::Markdown => match &page.markdown {
                None => Ok(ConvertResult {
                    format: ConvertFormat::Text,
                    content: page.text.clone(),
                    fallback: Some(ConvertFormat::Text),
                    reason: Some("no markdown rendering was produced for this page".to_string()),
                }),
                Some(markdown) => {
                    let confidence = page.markdown_meta.as_ref().map(|m| m.confidence).unwrap_or(0.0);
                    if confidence < confidence_threshold {
                        Ok(ConvertResult {
                            format: ConvertFormat::Text,
                            content: page.text.clone(),
                            fallback: Some(ConvertFormat::Text),
                            reason: Some(format!(
                                "markdown confidence {confidence:.2} is below the requested threshold {confidence_threshold:.2}"
                            )),
                        })
                    } else {
                        Ok(ConvertResult {
                            format: ConvertFormat::Markdown,
                            content: markdown.clone(),
                            fallback: None,
                            reason: None,
                        })
                    }
                }
            },
            ConvertFormat::Json => Ok(ConvertResult {
                format: ConvertFormat::Json,
                content: serialize_page_json(page, include_metadata)?,
                fallback: None,
                reason: None,
            }),
        }
    }

    /// Packages every page of a job as newline-delimited `text`/`markdown`
    /// records and returns it base64-encoded. `format` is restricted to
    /// `Text`/`Markdown`; `confidence_threshold` applies the same
    /// markdown-confidence fallback as `convert_to_format`, per page.
    pub async fn export_as_archive(
        &self,
        job_id: &str,
        format: ConvertFormat,
        confidence_threshold: f64,
    ) -> Result<ArchiveResult> {
        if format == ConvertFormat::Json {
            return Err(Error::InvalidInput(
                "export_as_archive only supports text or markdown".to_string(),
            ));
        }

        let pages = self.store.get_pages_by_job_id(job_id).await?;
        let mut out = String::new();
        for page in &pages {
            let converted = self.convert_to_format(page, format, confidence_threshold, false)?;
            let record = serde_json::json!({
                "url": page.canonical_url,
                "format": converted.format,
                "content": converted.content,
            });
            let line = serde_json::to_string(&record)
                .map_err(|e| Error::InvalidInput(format!("failed to serialize page: {e}")))?;
            out.push_str(&line);
            out.push('\n');
        }

        let extension = match format {
            ConvertFormat::Text => "text",
            ConvertFormat::Markdown => "markdown",
            ConvertFormat::Json => unreachable!("rejected above"),
        };

        Ok(ArchiveResult {
            size: out.len(),
            content: BASE64_STANDARD.encode(out.as_bytes()),
            mime_type: "application/x-ndjson".to_string(),
            encoding: "base64".to_string(),
            filename: format!("{job_id}.{extension}.ndjson"),
        })
    }

    pub async fn diagnostics_get_report(&self, format: ReportFormat) -> Result<String> {
        let report: DiagnosticsReport = self.logger.report(self.store.as_ref()).await?;
        Ok(report.render(format))
    }

    pub async fn diagnostics_get_errors(&self, job_id: &str) -> Result<Vec<ErrorLog>> {
        self.store.list_error_logs(job_id).await
    }

    pub async fn diagnostics_clear_errors(&self, job_id: &str) -> Result<()> {
        self.logger.clear();
        self.store.clear_error_logs(job_id).await
    }
}

fn serialize_page_json(page: &Page, include_metadata: bool) -> Result<String> {
    if include_metadata {
        return serde_json::to_string_pretty(page)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize page: {e}")));
    }
    let mut value = serde_json::to_value(page)
        .map_err(|e| Error::InvalidInput(format!("failed to serialize page: {e}")))?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("metadata");
    }
    serde_json::to_string_pretty(&value).map_err(|e| Error::InvalidInput(format!("failed to serialize page: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MarkdownMeta, MetadataRecord};

    fn sample_page() -> Page {
        Page {
            id: "page-1".to_string(),
            job_id: "job-1".to_string(),
            canonical_url: "https://example.com/".to_string(),
            alternate_urls: vec![],
            content_hash: "hash".to_string(),
            text: "hello world".to_string(),
            html: None,
            markdown: None,
            markdown_meta: None,
            metadata: Some(MetadataRecord::default()),
            seed_index: 0,
            depth: 0,
            captured_at: chrono::Utc::now(),
        }
    }

    fn capability() -> Capability {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> =
            Arc::new(crate::store::RedbStore::open(dir.path().join("store.redb")).unwrap());
        let logger = Arc::new(ErrorLogger::new(100, 1));
        let manager = Arc::new(CaptureManager::new(
            crate::config::CaptureConfig::default(),
            Arc::clone(&store),
            Arc::clone(&logger),
            Arc::new(crate::render::SlotPool::new(vec![])),
            reqwest::Client::new(),
        ));
        Capability::new(manager, store, logger)
    }

    #[test]
    fn convert_to_text_returns_stored_text() {
        let page = sample_page();
        let result = capability()
            .convert_to_format(&page, ConvertFormat::Text, 0.0, false)
            .unwrap();
        assert_eq!(result.content, "hello world");
        assert!(result.fallback.is_none());
    }

    #[test]
    fn convert_to_markdown_falls_back_to_text_when_absent() {
        let page = sample_page();
        let result = capability()
            .convert_to_format(&page, ConvertFormat::Markdown, 0.0, false)
            .unwrap();
        assert_eq!(result.format, ConvertFormat::Text);
        assert_eq!(result.fallback, Some(ConvertFormat::Text));
        assert!(result.reason.is_some());
    }

    #[test]
    fn convert_to_markdown_falls_back_below_confidence_threshold() {
        let mut page = sample_page();
        page.markdown = Some("# heading".to_string());
        page.markdown_meta = Some(MarkdownMeta {
            confidence: 0.4,
            h2_count: 1,
            has_tables: false,
        });
        let result = capability()
            .convert_to_format(&page, ConvertFormat::Markdown, 0.8, false)
            .unwrap();
        assert_eq!(result.format, ConvertFormat::Text);
        assert_eq!(result.content, "hello world");
        assert!(result.reason.unwrap().contains("confidence"));
    }

    #[test]
    fn convert_to_markdown_passes_above_confidence_threshold() {
        let mut page = sample_page();
        page.markdown = Some("# heading".to_string());
        page.markdown_meta = Some(MarkdownMeta {
            confidence: 0.9,
            h2_count: 1,
            has_tables: false,
        });
        let result = capability()
            .convert_to_format(&page, ConvertFormat::Markdown, 0.8, false)
            .unwrap();
        assert_eq!(result.format, ConvertFormat::Markdown);
        assert_eq!(result.content, "# heading");
        assert!(result.fallback.is_none());
    }

    #[test]
    fn convert_to_json_omits_metadata_unless_requested() {
        let page = sample_page();
        let without = capability()
            .convert_to_format(&page, ConvertFormat::Json, 0.0, false)
            .unwrap();
        assert!(!without.content.contains("\"metadata\""));

        let with = capability()
            .convert_to_format(&page, ConvertFormat::Json, 0.0, true)
            .unwrap();
        assert!(with.content.contains("\"metadata\""));
    }

    #[tokio::test]
    async fn export_as_archive_rejects_json() {
        let cap = capability();
        let err = cap.export_as_archive("job-1", ConvertFormat::Json, 0.0).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn export_as_archive_base64_encodes_ndjson_content() {
        let cap = capability();
        let archive = cap.export_as_archive("job-1", ConvertFormat::Text, 0.0).await.unwrap();
        assert_eq!(archive.encoding, "base64");
        assert_eq!(archive.mime_type, "application/x-ndjson");
        let decoded = BASE64_STANDARD.decode(&archive.content).unwrap();
        assert_eq!(decoded.len(), archive.size);
    }
}
