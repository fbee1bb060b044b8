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

//! One worker's loop over a job's queue: dequeue, render (or reuse a cached
//! render), dedup, persist, harvest links, repeat until the job drains or
//! is cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::render::RenderResult;
use crate::store::{JobStatus, Page};

use super::state::QueueItem;
use super::JobRuntime;

pub(crate) async fn worker_loop(runtime: Arc<JobRuntime>, _worker_id: usize) {
    loop {
        if runtime.is_cancelled() {
            return;
        }

        let item = {
            let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
            state.dequeue()
        };

        let item = match item {
            Some(item) => item,
            None => {
                let drained = runtime
                    .state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .is_drained();
                if drained {
                    return;
                }
                // Bounded wait: a notify can be missed if it fires between
                // the drained check and the wait registering, so a timeout
                // guarantees forward progress either way.
                tokio::select! {
                    _ = runtime.queue_notify.notified() => {}
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                }
                continue;
            }
        };

        process_item(&runtime, item).await;
        runtime.queue_notify.notify_waiters();
        runtime.publish_progress(JobStatus::Running);

        if !runtime.inter_request_delay.is_zero() {
            tokio::time::sleep(runtime.inter_request_delay).await;
        }
    }
}

async fn process_item(runtime: &Arc<JobRuntime>, item: QueueItem) {
    if runtime.is_cancelled() {
        let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
        state.release_in_flight(&item);
        return;
    }

    if !runtime.skip_cache {
        match runtime
            .store
            .find_latest_page_by_canonical_url(item.url.as_str())
            .await
        {
            Ok(Some(cached)) => {
                handle_cached(runtime, &item, cached).await;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(url = %item.url, error = %e, "cache lookup failed, rendering fresh");
            }
        }
    }

    for attempt in 1..=runtime.max_attempts {
        if runtime.is_cancelled() {
            let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
            state.release_in_flight(&item);
            return;
        }

        let guard = runtime.pool.acquire().await;
        let outcome = guard.slot().render(item.url.as_str(), &runtime.render_opts).await;
        drop(guard);

        match outcome {
            Ok(result) => {
                handle_rendered(runtime, &item, result).await;
                return;
            }
            Err(err) => {
                runtime.logger.log(
                    &runtime.job_id,
                    item.url.as_str(),
                    &format!("{:?}", err.kind),
                    &err.message,
                    err.retryable,
                    attempt,
                );

                if err.retryable && attempt < runtime.max_attempts {
                    tokio::time::sleep(runtime.retry_backoff).await;
                    continue;
                }
                break;
            }
        }
    }

    let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
    state.mark_failed(&item);
}

async fn handle_rendered(runtime: &Arc<JobRuntime>, item: &QueueItem, result: RenderResult) {
    let content_hash = crate::hash::content_hash(&result.text);
    let links = result.links.clone();

    let existing_page_id = {
        let state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
        state.find_duplicate_page_id(&content_hash)
    };

    // A dedup hit only resolves the URL against an existing page — it never
    // writes a new page row, counts against the per-seed limit, or bumps
    // pagesProcessed.
    if let Some(existing_id) = existing_page_id {
        if let Err(e) = runtime
            .store
            .add_alternate_url(&runtime.job_id, &existing_id, item.url.as_str())
            .await
        {
            tracing::warn!(url = %item.url, error = %e, "failed to record alternate url");
        }

        let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
        state.mark_duplicate(item);
        for link in &links {
            admit_discovered(&mut state, &link.url, item);
        }
        return;
    }

    let page = Page {
        id: Uuid::new_v4().to_string(),
        job_id: runtime.job_id.clone(),
        canonical_url: item.url.to_string(),
        alternate_urls: vec![],
        content_hash: content_hash.clone(),
        text: result.text,
        html: result.html,
        markdown: result.markdown,
        markdown_meta: result.markdown_meta,
        metadata: result.metadata,
        seed_index: item.seed_index,
        depth: item.depth,
        captured_at: Utc::now(),
    };

    if let Err(e) = runtime.store.save_page(&page).await {
        tracing::error!(url = %item.url, error = %e, "failed to persist page");
        let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
        state.mark_failed(item);
        return;
    }

    let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
    state.mark_captured(item, &content_hash, &page.id);
    for link in &links {
        admit_discovered(&mut state, &link.url, item);
    }
}

async fn handle_cached(runtime: &Arc<JobRuntime>, item: &QueueItem, cached: Page) {
    let page = Page {
        id: Uuid::new_v4().to_string(),
        job_id: runtime.job_id.clone(),
        canonical_url: item.url.to_string(),
        alternate_urls: vec![],
        content_hash: cached.content_hash.clone(),
        text: cached.text.clone(),
        html: cached.html.clone(),
        markdown: cached.markdown.clone(),
        markdown_meta: cached.markdown_meta.clone(),
        metadata: cached.metadata.clone(),
        seed_index: item.seed_index,
        depth: item.depth,
        captured_at: Utc::now(),
    };

    if let Err(e) = runtime.store.save_page(&page).await {
        tracing::error!(url = %item.url, error = %e, "failed to persist cached page");
        let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
        state.mark_failed(item);
        return;
    }

    let links = cached
        .html
        .as_deref()
        .map(|html| crate::render::extract_links(html, item.url.as_str()))
        .unwrap_or_default();

    let mut state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
    state.mark_captured(item, &cached.content_hash, &page.id);
    for link in &links {
        admit_discovered(&mut state, &link.url, item);
    }
}

fn admit_discovered(state: &mut super::JobState, raw_url: &str, parent: &QueueItem) {
    let Ok(candidate) = crate::canonical::canonicalize(raw_url, true) else {
        return;
    };
    let _ = state.try_enqueue_discovered(&candidate, &parent.url, parent.seed_index, parent.depth);
}
