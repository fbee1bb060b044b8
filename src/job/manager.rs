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

//! The fire-and-poll job API: `start` returns as soon as the
//! job is registered, the capture itself runs on a background task. Only
//! one job may be active per process at a time.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::canonical::{canonicalize, CanonicalUrl};
use crate::config::CaptureConfig;
use crate::diagnostics::ErrorLogger;
use crate::error::{Error, Result};
use crate::progress::{self, ProgressReader, ProgressSnapshot};
use crate::render::SlotPool;
use crate::store::{Job, JobStatus, Store};

use super::JobRuntime;

pub struct JobHandle {
    pub job_id: String,
    pub progress: ProgressReader,
}

/// `crawl.status`'s merged view: the persisted `Job` record plus whatever a
/// currently running job's progress bus reports live. Falls back to the
/// record's own counters and an empty queue/in-progress set once the job has
/// finished and its progress bus is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStatus {
    #[serde(flatten)]
    pub job: Job,
    pub pages_found: u32,
    pub queue_size: usize,
    pub in_progress: Vec<String>,
}

impl CrawlStatus {
    fn from_job_only(job: Job) -> Self {
        let pages_found = job.pages_found;
        Self {
            job,
            pages_found,
            queue_size: 0,
            in_progress: vec![],
        }
    }

    fn merge(job: Job, snapshot: Option<ProgressSnapshot>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                job,
                pages_found: snapshot.pages_found,
                queue_size: snapshot.queued,
                in_progress: snapshot.current_urls,
            },
            None => Self::from_job_only(job),
        }
    }
}

struct ActiveJob {
    runtime: Arc<JobRuntime>,
    progress: ProgressReader,
    task: tokio::task::JoinHandle<()>,
}

pub struct CaptureManager {
    config: CaptureConfig,
    store: Arc<dyn Store>,
    logger: Arc<ErrorLogger>,
    pool: Arc<SlotPool>,
    http_client: reqwest::Client,
    active: AsyncMutex<Option<ActiveJob>>,
}

impl CaptureManager {
    pub fn new(
        config: CaptureConfig,
        store: Arc<dyn Store>,
        logger: Arc<ErrorLogger>,
        pool: Arc<SlotPool>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            store,
            logger,
            pool,
            http_client,
            active: AsyncMutex::new(None),
        }
    }

    /// Starts a new job over `seeds`. Fails with `Error::AlreadyActive` if a
    /// job is already running — callers must `cancel` or wait for it to
    /// finish first.
    pub async fn start(&self, seeds: Vec<String>) -> Result<JobHandle> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            if !existing.task.is_finished() {
                return Err(Error::AlreadyActive);
            }
        }

        let canonical_seeds: Vec<CanonicalUrl> = seeds
            .iter()
            .map(|s| canonicalize(s, self.config.stable_query))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let job = Job {
            id: job_id.clone(),
            seeds: seeds.clone(),
            status: JobStatus::Running,
            page_limit_per_seed: self.config.page_limit_per_seed,
            pages_captured: 0,
            pages_failed: 0,
            pages_skipped_by_limit: 0,
            pages_found: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
        };
        self.store.create_job(&job).await?;

        let initial = ProgressSnapshot {
            job_id: job_id.clone(),
            status: JobStatus::Running,
            queued: 0,
            in_flight: 0,
            pages_captured: 0,
            pages_failed: 0,
            pages_skipped_by_limit: 0,
            pages_found: 0,
            current_urls: vec![],
        };
        let (writer, reader) = progress::channel(initial);

        let runtime = Arc::new(JobRuntime::new(
            job_id.clone(),
            self.config.scope_mode(),
            canonical_seeds,
            &self.config,
            Arc::clone(&self.pool),
            Arc::clone(&self.store),
            Arc::clone(&self.logger),
            writer,
            self.http_client.clone(),
        ));

        let task = {
            let runtime = Arc::clone(&runtime);
            let store = Arc::clone(&self.store);
            let num_workers = self.config.num_workers;
            let job_id = job_id.clone();
            tokio::spawn(async move {
                runtime.run(num_workers).await;
                let final_status = if runtime.is_cancelled() {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                runtime.publish_progress(final_status);
                if let Ok(Some(mut job)) = store.get_job(&job_id).await {
                    let (captured, failed, skipped, found) = {
                        let state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
                        (
                            state.pages_captured(),
                            state.pages_failed(),
                            state.pages_skipped_by_limit(),
                            state.pages_found(),
                        )
                    };
                    job.status = final_status;
                    job.pages_captured = captured;
                    job.pages_failed = failed;
                    job.pages_skipped_by_limit = skipped;
                    job.pages_found = found;
                    job.updated_at = Utc::now();
                    job.finished_at = Some(Utc::now());
                    let _ = store.update_job(&job).await;
                }
            })
        };

        *active = Some(ActiveJob {
            runtime,
            progress: reader.clone(),
            task,
        });

        Ok(JobHandle { job_id, progress: reader })
    }

    /// Cooperatively cancels the active job, if any and if it matches
    /// `job_id`. A no-op (not an error) if that job already finished.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(job) if job.runtime.job_id == job_id => {
                job.runtime.cancel();
                Ok(())
            }
            _ => Err(Error::JobNotFound(job_id.to_string())),
        }
    }

    /// Resumes a previously interrupted job: reloads its captured pages to
    /// rebuild the dedup index and completed set, then restarts workers
    /// over whatever wasn't finished. `skippedByLimit` bookkeeping is kept
    /// in memory only and not persisted, so a resumed job may recapture
    /// a handful of URLs a prior run had already skipped for the limit.
    pub async fn resume(&self, job_id: &str) -> Result<JobHandle> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            if !existing.task.is_finished() {
                return Err(Error::AlreadyActive);
            }
        }

        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

        let canonical_seeds: Vec<CanonicalUrl> = job
            .seeds
            .iter()
            .map(|s| canonicalize(s, self.config.stable_query))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let initial = ProgressSnapshot {
            job_id: job_id.to_string(),
            status: JobStatus::Running,
            queued: 0,
            in_flight: 0,
            pages_captured: job.pages_captured,
            pages_failed: job.pages_failed,
            pages_skipped_by_limit: job.pages_skipped_by_limit,
            pages_found: job.pages_found,
            current_urls: vec![],
        };
        let (writer, reader) = progress::channel(initial);

        let runtime = Arc::new(JobRuntime::new(
            job_id.to_string(),
            self.config.scope_mode(),
            canonical_seeds,
            &self.config,
            Arc::clone(&self.pool),
            Arc::clone(&self.store),
            Arc::clone(&self.logger),
            writer,
            self.http_client.clone(),
        ));

        let pages = self.store.get_pages_by_job_id(job_id).await?;
        runtime.restore_from_pages(&pages);

        let mut resumed_job = job;
        resumed_job.status = JobStatus::Running;
        resumed_job.updated_at = Utc::now();
        resumed_job.finished_at = None;
        self.store.update_job(&resumed_job).await?;

        let task = {
            let runtime = Arc::clone(&runtime);
            let store = Arc::clone(&self.store);
            let num_workers = self.config.num_workers;
            let job_id = job_id.to_string();
            tokio::spawn(async move {
                runtime.run(num_workers).await;
                let final_status = if runtime.is_cancelled() {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                runtime.publish_progress(final_status);
                if let Ok(Some(mut job)) = store.get_job(&job_id).await {
                    let (captured, failed, skipped, found) = {
                        let state = runtime.state.lock().unwrap_or_else(|e| e.into_inner());
                        (
                            state.pages_captured(),
                            state.pages_failed(),
                            state.pages_skipped_by_limit(),
                            state.pages_found(),
                        )
                    };
                    job.status = final_status;
                    job.pages_captured = captured;
                    job.pages_failed = failed;
                    job.pages_skipped_by_limit = skipped;
                    job.pages_found = found;
                    job.updated_at = Utc::now();
                    job.finished_at = Some(Utc::now());
                    let _ = store.update_job(&job).await;
                }
            })
        };

        *active = Some(ActiveJob {
            runtime,
            progress: reader.clone(),
            task,
        });

        Ok(JobHandle {
            job_id: job_id.to_string(),
            progress: reader,
        })
    }

    /// Merges the persisted job record with the live progress snapshot when
    /// `job_id` matches the currently active job; otherwise returns a view
    /// derived from the record alone.
    pub async fn status(&self, job_id: &str) -> Result<CrawlStatus> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

        let active = self.active.lock().await;
        let snapshot = match active.as_ref() {
            Some(active) if active.runtime.job_id == job_id => Some(active.progress.latest()),
            _ => None,
        };

        Ok(CrawlStatus::merge(job, snapshot))
    }
}
