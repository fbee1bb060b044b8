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

//! The capture job scheduler — the core of this crate. A
//! `JobRuntime` owns one job's `JobState` plus everything its workers share:
//! the render slot pool, the store, the error logger, and the progress bus.

pub mod manager;
pub mod state;
mod worker;

pub use manager::{CaptureManager, JobHandle};
pub use state::{JobState, QueueItem, RejectReason};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::canonical::ScopeMode;
use crate::config::CaptureConfig;
use crate::diagnostics::ErrorLogger;
use crate::discovery::SitemapSeeder;
use crate::progress::ProgressWriter;
use crate::render::{RenderOptions, SlotPool};
use crate::store::Store;

pub struct JobRuntime {
    pub job_id: String,
    pub(crate) state: Mutex<JobState>,
    pub(crate) queue_notify: Notify,
    pub(crate) pool: Arc<SlotPool>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) logger: Arc<ErrorLogger>,
    pub(crate) progress: ProgressWriter,
    pub(crate) sitemap_seeder: SitemapSeeder,
    pub(crate) render_opts: RenderOptions,
    pub(crate) inter_request_delay: Duration,
    pub(crate) skip_cache: bool,
    pub(crate) max_attempts: u32,
    pub(crate) retry_backoff: Duration,
}

impl JobRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: String,
        scope_mode: ScopeMode,
        seeds: Vec<crate::canonical::CanonicalUrl>,
        config: &CaptureConfig,
        pool: Arc<SlotPool>,
        store: Arc<dyn Store>,
        logger: Arc<ErrorLogger>,
        progress: ProgressWriter,
        http_client: reqwest::Client,
    ) -> Self {
        let sitemap_seeder = SitemapSeeder::new(
            http_client,
            Duration::from_secs(config.sitemap.root_timeout_secs),
            Duration::from_secs(config.sitemap.nested_timeout_secs),
            Duration::from_secs(config.sitemap.total_timeout_secs),
            config.sitemap.max_index_depth,
        );

        Self {
            job_id: job_id.clone(),
            state: Mutex::new(JobState::new(
                job_id,
                seeds,
                scope_mode,
                config.page_limit_per_seed,
                config.follow_external,
                config.max_external_hops,
            )),
            queue_notify: Notify::new(),
            pool,
            store,
            logger,
            progress,
            sitemap_seeder,
            render_opts: RenderOptions {
                wait_budget_ms: config.render.wait_budget_ms,
                content_stability_budget_ms: config.render.content_stability_budget_ms,
                use_incognito: config.use_incognito,
            },
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
            skip_cache: config.skip_cache,
            max_attempts: config.render.max_render_attempts.max(1),
            retry_backoff: Duration::from_millis(config.render.retry_backoff_ms),
        }
    }

    pub fn cancel(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).cancel();
        self.queue_notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).is_cancelled()
    }

    pub fn restore_from_pages(&self, pages: &[crate::store::Page]) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .restore_from_pages(pages);
    }

    /// Runs Phase A for every seed, enqueuing both the seed itself and any
    /// sitemap-discovered URLs, then runs `num_workers` worker tasks to
    /// drain the queue. Returns once the job is drained or cancelled.
    pub async fn run(self: &Arc<Self>, num_workers: usize) {
        self.seed_phase().await;

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let runtime = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                worker::worker_loop(runtime, worker_id).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        self.pool.shutdown().await;
    }

    async fn seed_phase(self: &Arc<Self>) {
        let seeds = self.state.lock().unwrap_or_else(|e| e.into_inner()).seeds.clone();

        for (seed_index, seed) in seeds.iter().enumerate() {
            if self.is_cancelled() {
                return;
            }

            {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                state.enqueue_seed(seed_index);
            }

            let discovered = self.sitemap_seeder.seed(&seed.parsed()).await;
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            for url in discovered {
                if let Ok(candidate) = crate::canonical::canonicalize(url.as_str(), true) {
                    let _ = state.try_enqueue_discovered(&candidate, seed, seed_index, 0);
                }
            }
        }

        self.queue_notify.notify_waiters();
    }

    pub fn publish_progress(&self, status: crate::store::JobStatus) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.progress.publish(crate::progress::ProgressSnapshot {
            job_id: self.job_id.clone(),
            status,
            queued: state.queued_len(),
            in_flight: state.in_flight_len(),
            pages_captured: state.pages_captured(),
            pages_failed: state.pages_failed(),
            pages_skipped_by_limit: state.pages_skipped_by_limit(),
            pages_found: state.pages_found(),
            current_urls: state.in_flight_urls(),
        });
    }
}
