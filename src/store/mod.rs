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

//! The persistence adapter. `Store` is the seam the
//! core schedules against; `RedbStore` is one embedded implementation, not
//! part of the contract itself.

pub mod models;
mod redb_store;

pub use models::{ErrorLog, Job, JobStatus, Page};
pub use redb_store::RedbStore;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<()>;
    async fn update_job(&self, job: &Job) -> Result<()>;
    async fn delete_job(&self, job_id: &str) -> Result<()>;
    async fn list_jobs(&self) -> Result<Vec<Job>>;
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    async fn save_page(&self, page: &Page) -> Result<()>;
    async fn get_pages_by_job_id(&self, job_id: &str) -> Result<Vec<Page>>;
    async fn find_page_by_content_hash(
        &self,
        job_id: &str,
        content_hash: &str,
    ) -> Result<Option<Page>>;
    /// Finds any job's most recently captured page at this canonical URL, so
    /// a fresh job can reuse a prior render instead of paying for a new one.
    /// Scans every stored page, since the store has no canonical-URL index
    /// spanning jobs; fine at the scale a single embedded store targets.
    async fn find_latest_page_by_canonical_url(&self, canonical_url: &str) -> Result<Option<Page>>;
    async fn add_alternate_url(&self, job_id: &str, page_id: &str, url: &str) -> Result<()>;
    async fn search_pages_by_url_substring(
        &self,
        job_id: &str,
        substring: &str,
    ) -> Result<Vec<Page>>;

    async fn save_error_log(&self, entry: &ErrorLog) -> Result<()>;
    async fn list_error_logs(&self, job_id: &str) -> Result<Vec<ErrorLog>>;
    async fn clear_error_logs(&self, job_id: &str) -> Result<()>;
    async fn purge_error_logs_older_than(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize>;
}
