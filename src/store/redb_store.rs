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

//! `redb`-backed `Store` implementation. `redb`'s API is synchronous, so
//! every operation runs on the blocking pool via `spawn_blocking` rather
//! than holding up the async worker loop.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};

use crate::error::Error;
use crate::error::Result;

use super::models::{ErrorLog, Job, Page};
use super::Store;

const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
const PAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("pages");
const PAGES_BY_JOB: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("pages_by_job");
const PAGES_BY_HASH: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("pages_by_hash");
const ERROR_LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("error_logs");
const ERROR_LOGS_BY_JOB: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("error_logs_by_job");

pub struct RedbStore {
    db: Arc<Database>,
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::StoreFailed(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(store_err)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(store_err)
}

fn hash_key(job_id: &str, content_hash: &str) -> String {
    format!("{job_id}\u{0}{content_hash}")
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(store_err)?;

        // Touch every table once so a fresh database always has them, and
        // reads against an empty store see an empty table rather than a
        // "table does not exist" error.
        let txn = db.begin_write().map_err(store_err)?;
        {
            txn.open_table(JOBS).map_err(store_err)?;
            txn.open_table(PAGES).map_err(store_err)?;
            txn.open_multimap_table(PAGES_BY_JOB).map_err(store_err)?;
            txn.open_multimap_table(PAGES_BY_HASH).map_err(store_err)?;
            txn.open_table(ERROR_LOGS).map_err(store_err)?;
            txn.open_multimap_table(ERROR_LOGS_BY_JOB)
                .map_err(store_err)?;
        }
        txn.commit().map_err(store_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Database>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| store_err(format!("store task panicked: {e}")))?
    }
}

#[async_trait::async_trait]
impl Store for RedbStore {
    async fn create_job(&self, job: &Job) -> Result<()> {
        self.update_job(job).await
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let job = job.clone();
        self.run_blocking(move |db| {
            let bytes = encode(&job)?;
            let txn = db.begin_write().map_err(store_err)?;
            {
                let mut table = txn.open_table(JOBS).map_err(store_err)?;
                table.insert(job.id.as_str(), bytes.as_slice()).map_err(store_err)?;
            }
            txn.commit().map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        let job_id = job_id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(store_err)?;
            {
                let mut jobs = txn.open_table(JOBS).map_err(store_err)?;
                jobs.remove(job_id.as_str()).map_err(store_err)?;

                let mut pages = txn.open_table(PAGES).map_err(store_err)?;
                let mut pages_by_job = txn.open_multimap_table(PAGES_BY_JOB).map_err(store_err)?;
                let page_ids: Vec<String> = pages_by_job
                    .get(job_id.as_str())
                    .map_err(store_err)?
                    .filter_map(|r| r.ok().map(|v| v.value().to_string()))
                    .collect();
                for page_id in &page_ids {
                    pages.remove(page_id.as_str()).map_err(store_err)?;
                }
                pages_by_job.remove_all(job_id.as_str()).map_err(store_err)?;

                // pages_by_hash entries for this job become dangling here —
                // harmless, since every lookup already joins through PAGES
                // and silently treats a missing page id as a miss.

                let mut error_logs = txn.open_table(ERROR_LOGS).map_err(store_err)?;
                let mut error_logs_by_job = txn
                    .open_multimap_table(ERROR_LOGS_BY_JOB)
                    .map_err(store_err)?;
                let log_ids: Vec<String> = error_logs_by_job
                    .get(job_id.as_str())
                    .map_err(store_err)?
                    .filter_map(|r| r.ok().map(|v| v.value().to_string()))
                    .collect();
                for log_id in &log_ids {
                    error_logs.remove(log_id.as_str()).map_err(store_err)?;
                }
                error_logs_by_job
                    .remove_all(job_id.as_str())
                    .map_err(store_err)?;
            }
            txn.commit().map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(store_err)?;
            let table = txn.open_table(JOBS).map_err(store_err)?;
            let mut jobs = Vec::new();
            for entry in table.iter().map_err(store_err)? {
                let (_, value) = entry.map_err(store_err)?;
                jobs.push(decode(value.value())?);
            }
            Ok(jobs)
        })
        .await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        let job_id = job_id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(store_err)?;
            let table = txn.open_table(JOBS).map_err(store_err)?;
            match table.get(job_id.as_str()).map_err(store_err)? {
                Some(value) => Ok(Some(decode(value.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn save_page(&self, page: &Page) -> Result<()> {
        let page = page.clone();
        self.run_blocking(move |db| {
            let bytes = encode(&page)?;
            let txn = db.begin_write().map_err(store_err)?;
            {
                let mut pages = txn.open_table(PAGES).map_err(store_err)?;
                pages.insert(page.id.as_str(), bytes.as_slice()).map_err(store_err)?;

                let mut pages_by_job = txn.open_multimap_table(PAGES_BY_JOB).map_err(store_err)?;
                pages_by_job
                    .insert(page.job_id.as_str(), page.id.as_str())
                    .map_err(store_err)?;

                let mut pages_by_hash =
                    txn.open_multimap_table(PAGES_BY_HASH).map_err(store_err)?;
                let key = hash_key(&page.job_id, &page.content_hash);
                pages_by_hash
                    .insert(key.as_str(), page.id.as_str())
                    .map_err(store_err)?;
            }
            txn.commit().map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn get_pages_by_job_id(&self, job_id: &str) -> Result<Vec<Page>> {
        let job_id = job_id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(store_err)?;
            let pages_by_job = txn.open_multimap_table(PAGES_BY_JOB).map_err(store_err)?;
            let pages = txn.open_table(PAGES).map_err(store_err)?;

            let mut result = Vec::new();
            for entry in pages_by_job.get(job_id.as_str()).map_err(store_err)? {
                let page_id = entry.map_err(store_err)?.value().to_string();
                if let Some(value) = pages.get(page_id.as_str()).map_err(store_err)? {
                    result.push(decode(value.value())?);
                }
            }
            Ok(result)
        })
        .await
    }

    async fn find_page_by_content_hash(
        &self,
        job_id: &str,
        content_hash: &str,
    ) -> Result<Option<Page>> {
        let key = hash_key(job_id, content_hash);
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(store_err)?;
            let pages_by_hash = txn.open_multimap_table(PAGES_BY_HASH).map_err(store_err)?;
            let pages = txn.open_table(PAGES).map_err(store_err)?;

            let mut iter = pages_by_hash.get(key.as_str()).map_err(store_err)?;
            match iter.next() {
                Some(entry) => {
                    let page_id = entry.map_err(store_err)?.value().to_string();
                    match pages.get(page_id.as_str()).map_err(store_err)? {
                        Some(value) => Ok(Some(decode(value.value())?)),
                        None => Ok(None),
                    }
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_latest_page_by_canonical_url(&self, canonical_url: &str) -> Result<Option<Page>> {
        let canonical_url = canonical_url.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(store_err)?;
            let table = txn.open_table(PAGES).map_err(store_err)?;
            let mut best: Option<Page> = None;
            for entry in table.iter().map_err(store_err)? {
                let (_, value) = entry.map_err(store_err)?;
                let page: Page = decode(value.value())?;
                if page.canonical_url == canonical_url {
                    let newer = best
                        .as_ref()
                        .map_or(true, |b| page.captured_at > b.captured_at);
                    if newer {
                        best = Some(page);
                    }
                }
            }
            Ok(best)
        })
        .await
    }

    async fn add_alternate_url(&self, job_id: &str, page_id: &str, url: &str) -> Result<()> {
        let (job_id, page_id, url) = (job_id.to_string(), page_id.to_string(), url.to_string());
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(store_err)?;
            {
                let mut pages = txn.open_table(PAGES).map_err(store_err)?;
                let existing = pages
                    .get(page_id.as_str())
                    .map_err(store_err)?
                    .map(|v| v.value().to_vec());
                let Some(existing) = existing else {
                    return Err(Error::StoreFailed(format!(
                        "page '{page_id}' not found for job '{job_id}'"
                    )));
                };
                let mut page: Page = decode(&existing)?;
                if !page.alternate_urls.iter().any(|u| u == &url) {
                    page.alternate_urls.push(url);
                }
                let bytes = encode(&page)?;
                pages.insert(page_id.as_str(), bytes.as_slice()).map_err(store_err)?;
            }
            txn.commit().map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn search_pages_by_url_substring(
        &self,
        job_id: &str,
        substring: &str,
    ) -> Result<Vec<Page>> {
        let substring = substring.to_ascii_lowercase();
        let pages = self.get_pages_by_job_id(job_id).await?;
        Ok(pages
            .into_iter()
            .filter(|p| {
                p.canonical_url.to_ascii_lowercase().contains(&substring)
                    || p.alternate_urls
                        .iter()
                        .any(|u| u.to_ascii_lowercase().contains(&substring))
            })
            .collect())
    }

    async fn save_error_log(&self, entry: &ErrorLog) -> Result<()> {
        let entry = entry.clone();
        self.run_blocking(move |db| {
            let bytes = encode(&entry)?;
            let txn = db.begin_write().map_err(store_err)?;
            {
                let mut logs = txn.open_table(ERROR_LOGS).map_err(store_err)?;
                logs.insert(entry.id.as_str(), bytes.as_slice()).map_err(store_err)?;

                let mut logs_by_job = txn
                    .open_multimap_table(ERROR_LOGS_BY_JOB)
                    .map_err(store_err)?;
                logs_by_job
                    .insert(entry.job_id.as_str(), entry.id.as_str())
                    .map_err(store_err)?;
            }
            txn.commit().map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn list_error_logs(&self, job_id: &str) -> Result<Vec<ErrorLog>> {
        let job_id = job_id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(store_err)?;
            let logs_by_job = txn
                .open_multimap_table(ERROR_LOGS_BY_JOB)
                .map_err(store_err)?;
            let logs = txn.open_table(ERROR_LOGS).map_err(store_err)?;

            let mut result = Vec::new();
            for entry in logs_by_job.get(job_id.as_str()).map_err(store_err)? {
                let log_id = entry.map_err(store_err)?.value().to_string();
                if let Some(value) = logs.get(log_id.as_str()).map_err(store_err)? {
                    result.push(decode(value.value())?);
                }
            }
            result.sort_by_key(|l: &ErrorLog| l.timestamp);
            Ok(result)
        })
        .await
    }

    async fn clear_error_logs(&self, job_id: &str) -> Result<()> {
        let job_id = job_id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(store_err)?;
            {
                let mut logs = txn.open_table(ERROR_LOGS).map_err(store_err)?;
                let mut logs_by_job = txn
                    .open_multimap_table(ERROR_LOGS_BY_JOB)
                    .map_err(store_err)?;
                let log_ids: Vec<String> = logs_by_job
                    .get(job_id.as_str())
                    .map_err(store_err)?
                    .filter_map(|r| r.ok().map(|v| v.value().to_string()))
                    .collect();
                for log_id in &log_ids {
                    logs.remove(log_id.as_str()).map_err(store_err)?;
                }
                logs_by_job.remove_all(job_id.as_str()).map_err(store_err)?;
            }
            txn.commit().map_err(store_err)?;
            Ok(())
        })
        .await
    }

    async fn purge_error_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(store_err)?;
            let mut purged = 0usize;
            {
                let mut logs = txn.open_table(ERROR_LOGS).map_err(store_err)?;
                let stale_ids: Vec<String> = {
                    let mut ids = Vec::new();
                    for entry in logs.iter().map_err(store_err)? {
                        let (key, value) = entry.map_err(store_err)?;
                        let log: ErrorLog = decode(value.value())?;
                        if log.timestamp < cutoff {
                            ids.push(key.value().to_string());
                        }
                    }
                    ids
                };
                for id in &stale_ids {
                    logs.remove(id.as_str()).map_err(store_err)?;
                    purged += 1;
                }
            }
            txn.commit().map_err(store_err)?;
            Ok(purged)
        })
        .await
    }
}
