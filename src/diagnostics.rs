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

//! The error logger: every per-URL failure is traced
//! immediately and also buffered, bounded, and retained, so a caller can
//! pull a report without re-deriving it from log lines.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{ErrorLog, Store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Json,
    Text,
}

pub struct DiagnosticsReport {
    pub version: &'static str,
    pub job_count: usize,
    pub recent_errors: Vec<ErrorLog>,
}

impl DiagnosticsReport {
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(&ReportJson {
                version: self.version,
                job_count: self.job_count,
                recent_errors: &self.recent_errors,
            })
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}")),
            ReportFormat::Text => {
                let mut out = format!(
                    "sitecapture {}\njobs seen: {}\nrecent errors: {}\n",
                    self.version,
                    self.job_count,
                    self.recent_errors.len()
                );
                for err in &self.recent_errors {
                    out.push_str(&format!(
                        " [{}] {} {} - {}\n",
                        err.timestamp, err.job_id, err.url, err.message
                    ));
                }
                out
            }
        }
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    version: &'static str,
    job_count: usize,
    recent_errors: &'a [ErrorLog],
}

/// In-process buffer mirroring what's in the store, bounded to
/// `max_entries` and ignoring anything older than `retention_days`. The
/// store is the durable copy; this is what `report()` reads from without
/// a round trip.
pub struct ErrorLogger {
    max_entries: usize,
    retention_days: i64,
    buffer: Mutex<std::collections::VecDeque<ErrorLog>>,
}

impl ErrorLogger {
    pub fn new(max_entries: usize, retention_days: i64) -> Self {
        Self {
            max_entries,
            retention_days,
            buffer: Mutex::new(std::collections::VecDeque::with_capacity(max_entries)),
        }
    }

    /// Traces the failure immediately and appends it to the bounded buffer,
    /// evicting the oldest entry if already at capacity.
    pub fn log(&self, job_id: &str, url: &str, kind: &str, message: &str, retryable: bool, attempt: u32) -> ErrorLog {
        tracing::warn!(job_id, url, kind, attempt, retryable, "{message}");

        let entry = ErrorLog {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            url: url.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
            retryable,
            attempt,
            timestamp: Utc::now(),
        };

        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.len() >= self.max_entries {
            buffer.pop_front();
        }
        buffer.push_back(entry.clone());

        entry
    }

    pub fn recent(&self) -> Vec<ErrorLog> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn retention_cutoff(&self) -> chrono::DateTime<Utc> {
        Utc::now() - chrono::Duration::days(self.retention_days)
    }

    pub async fn report(&self, store: &dyn Store) -> Result<DiagnosticsReport> {
        let job_count = store.list_jobs().await?.len();
        Ok(DiagnosticsReport {
            version: env!("CARGO_PKG_VERSION"),
            job_count,
            recent_errors: self.recent(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_evicts_oldest_past_capacity() {
        let logger = ErrorLogger::new(2, 30);
        logger.log("job-1", "https://a", "NavigationFailed", "a", true, 1);
        logger.log("job-1", "https://b", "NavigationFailed", "b", true, 1);
        logger.log("job-1", "https://c", "NavigationFailed", "c", true, 1);

        let recent = logger.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].url, "https://b");
        assert_eq!(recent[1].url, "https://c");
    }

    #[test]
    fn clear_empties_buffer() {
        let logger = ErrorLogger::new(10, 30);
        logger.log("job-1", "https://a", "NavigationFailed", "a", true, 1);
        logger.clear();
        assert!(logger.recent().is_empty());
    }

    #[test]
    fn text_report_includes_recent_errors() {
        let logger = ErrorLogger::new(10, 30);
        logger.log("job-1", "https://a", "NavigationFailed", "boom", true, 1);
        let report = DiagnosticsReport {
            version: "0.1.0",
            job_count: 1,
            recent_errors: logger.recent(),
        };
        let text = report.render(ReportFormat::Text);
        assert!(text.contains("boom"));
        assert!(text.contains("job-1"));
    }
}
