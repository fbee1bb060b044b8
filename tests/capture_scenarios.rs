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
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! End-to-end capture scenarios driven by `MockRenderSlot` instead of a
//! real rendering service. Run with `cargo test --features test-support`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sitecapture::canonical::{canonicalize, ScopeMode};
use sitecapture::config::CaptureConfig;
use sitecapture::diagnostics::ErrorLogger;
use sitecapture::job::JobRuntime;
use sitecapture::progress;
use sitecapture::render::mock::{MockPage, MockRenderSlot};
use sitecapture::render::{RenderSlot, SlotPool};
use sitecapture::store::{RedbStore, Store};

fn test_config() -> CaptureConfig {
    let mut config = CaptureConfig::default();
    config.inter_request_delay_ms = 0;
    config.sitemap.root_timeout_secs = 0;
    config.sitemap.nested_timeout_secs = 0;
    config.sitemap.total_timeout_secs = 0;
    config
}

async fn runtime_with(
    job_id: &str,
    seed: &str,
    pages: HashMap<String, MockPage>,
    config: &CaptureConfig,
    store: Arc<dyn Store>,
) -> (Arc<JobRuntime>, Arc<MockRenderSlot>) {
    let slot = Arc::new(MockRenderSlot::new(pages));
    let pool = Arc::new(SlotPool::new(vec![Arc::clone(&slot) as Arc<dyn RenderSlot>]));
    let logger = Arc::new(ErrorLogger::new(100, 30));
    let (writer, _reader) = progress::channel(progress::ProgressSnapshot {
        job_id: job_id.to_string(),
        status: sitecapture::store::JobStatus::Running,
        queued: 0,
        in_flight: 0,
        pages_captured: 0,
        pages_failed: 0,
        pages_skipped_by_limit: 0,
        pages_found: 0,
        current_urls: vec![],
    });

    let seed_url = canonicalize(seed, config.stable_query).unwrap();
    let http_client = reqwest::Client::new();

    let runtime = Arc::new(JobRuntime::new(
        job_id.to_string(),
        ScopeMode::Strict,
        vec![seed_url],
        config,
        pool,
        store,
        logger,
        writer,
        http_client,
    ));

    (runtime, slot)
}

fn temp_store() -> Arc<dyn Store> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sitecapture-test.redb");
    // Leak the tempdir so the database file outlives this function; each
    // test gets its own process-unique path anyway.
    std::mem::forget(dir);
    Arc::new(RedbStore::open(path).unwrap())
}

#[tokio::test]
async fn captures_every_page_reachable_by_links() {
    let config = test_config();
    let store = temp_store();

    let mut pages = HashMap::new();
    pages.insert(
        "https://example.com/docs".to_string(),
        MockPage::text("home").with_links(vec!["https://example.com/docs/a", "https://example.com/docs/b"]),
    );
    pages.insert(
        "https://example.com/docs/a".to_string(),
        MockPage::text("page a"),
    );
    pages.insert(
        "https://example.com/docs/b".to_string(),
        MockPage::text("page b").with_links(vec!["https://example.com/docs/a"]),
    );

    let (runtime, _slot) =
        runtime_with("job-1", "https://example.com/docs", pages, &config, Arc::clone(&store)).await;

    runtime.run(2).await;

    let captured = store.get_pages_by_job_id("job-1").await.unwrap();
    assert_eq!(captured.len(), 3);
}

#[tokio::test]
async fn identical_content_at_two_urls_folds_into_one_page() {
    let config = test_config();
    let store = temp_store();

    let mut pages = HashMap::new();
    pages.insert(
        "https://example.com/docs".to_string(),
        MockPage::text("shared content")
            .with_links(vec!["https://example.com/docs/mirror"]),
    );
    pages.insert(
        "https://example.com/docs/mirror".to_string(),
        MockPage::text("shared content"),
    );

    let (runtime, _slot) =
        runtime_with("job-1", "https://example.com/docs", pages, &config, Arc::clone(&store)).await;

    runtime.run(1).await;

    let captured = store.get_pages_by_job_id("job-1").await.unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].alternate_urls.len(), 1);
}

#[tokio::test]
async fn out_of_scope_links_are_never_captured() {
    let config = test_config();
    let store = temp_store();

    let mut pages = HashMap::new();
    pages.insert(
        "https://example.com/docs".to_string(),
        MockPage::text("home").with_links(vec!["https://other.com/elsewhere"]),
    );

    let (runtime, _slot) =
        runtime_with("job-1", "https://example.com/docs", pages, &config, Arc::clone(&store)).await;

    runtime.run(1).await;

    let captured = store.get_pages_by_job_id("job-1").await.unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].canonical_url, "https://example.com/docs");
}

#[tokio::test]
async fn cancellation_stops_the_job_before_it_drains() {
    let config = test_config();
    let store = temp_store();

    let mut pages = HashMap::new();
    pages.insert(
        "https://example.com/docs".to_string(),
        MockPage::text("home")
            .with_delay(Duration::from_millis(50))
            .with_links(vec!["https://example.com/docs/a"]),
    );
    pages.insert(
        "https://example.com/docs/a".to_string(),
        MockPage::text("a").with_delay(Duration::from_millis(200)),
    );

    let (runtime, _slot) =
        runtime_with("job-1", "https://example.com/docs", pages, &config, Arc::clone(&store)).await;

    let runtime_for_cancel = Arc::clone(&runtime);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        runtime_for_cancel.cancel();
    });

    runtime.run(1).await;

    assert!(runtime.is_cancelled());
}

#[tokio::test]
async fn retryable_render_errors_are_retried_before_failing() {
    let mut config = test_config();
    config.render.max_render_attempts = 2;
    config.render.retry_backoff_ms = 1;
    let store = temp_store();

    let mut pages = HashMap::new();
    pages.insert(
        "https://example.com/docs".to_string(),
        MockPage::failing(sitecapture::render::RenderError {
            kind: sitecapture::render::RenderErrorKind::NavigationFailed,
            message: "temporary failure".to_string(),
            retryable: true,
        }),
    );

    let (runtime, slot) =
        runtime_with("job-1", "https://example.com/docs", pages, &config, Arc::clone(&store)).await;

    runtime.run(1).await;

    assert_eq!(slot.calls().len(), 2);
    let captured = store.get_pages_by_job_id("job-1").await.unwrap();
    assert!(captured.is_empty());
}
