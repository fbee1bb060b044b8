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

//! Persisted entity shapes. These are the store's on-disk
//! schema as well as the shapes handed back through `capability` — the two
//! never diverge, so there's no separate DTO layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::render::{MarkdownMeta, MetadataRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub seeds: Vec<String>,
    pub status: JobStatus,
    pub page_limit_per_seed: Option<u32>,
    pub pages_captured: u32,
    pub pages_failed: u32,
    pub pages_skipped_by_limit: u32,
    /// `|completed| + |inFlight| + |queue| + |skippedByLimit|` at the time
    /// the job last updated this record — see `JobState::pages_found`.
    pub pages_found: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present once the job reaches a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub job_id: String,
    pub canonical_url: String,
    /// Other URLs that canonicalized to the same identity, or that
    /// produced byte-identical content and were folded into this row
    /// ("alternate URL folding").
    pub alternate_urls: Vec<String>,
    pub content_hash: String,
    pub text: String,
    pub html: Option<String>,
    pub markdown: Option<String>,
    pub markdown_meta: Option<MarkdownMeta>,
    pub metadata: Option<MetadataRecord>,
    pub seed_index: usize,
    pub depth: u32,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLog {
    pub id: String,
    pub job_id: String,
    pub url: String,
    pub kind: String,
    pub message: String,
    pub retryable: bool,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}
