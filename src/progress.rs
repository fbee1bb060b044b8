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

//! The progress bus: single writer, many lossy readers. A
//! reader that's slow or absent never blocks the worker loop — it just
//! misses intermediate snapshots and sees the latest one whenever it next
//! looks.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::store::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub queued: usize,
    pub in_flight: usize,
    pub pages_captured: u32,
    pub pages_failed: u32,
    pub pages_skipped_by_limit: u32,
    /// `|completed| + |inFlight| + |queue| + |skippedByLimit|`.
    pub pages_found: u32,
    /// URLs currently being rendered, one per busy worker.
    pub current_urls: Vec<String>,
}

#[derive(Clone)]
pub struct ProgressWriter {
    tx: watch::Sender<ProgressSnapshot>,
}

#[derive(Clone)]
pub struct ProgressReader {
    rx: watch::Receiver<ProgressSnapshot>,
}

pub fn channel(initial: ProgressSnapshot) -> (ProgressWriter, ProgressReader) {
    let (tx, rx) = watch::channel(initial);
    (ProgressWriter { tx }, ProgressReader { rx })
}

impl ProgressWriter {
    /// Publishes a new snapshot. Never errors: if every reader has been
    /// dropped this is a silent no-op, matching a bus no one is watching.
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        let _ = self.tx.send(snapshot);
    }
}

impl ProgressReader {
    /// Returns the latest snapshot without waiting.
    pub fn latest(&self) -> ProgressSnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot distinct from the one last observed.
    pub async fn changed(&mut self) -> Option<ProgressSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pages_captured: u32) -> ProgressSnapshot {
        ProgressSnapshot {
            job_id: "job-1".to_string(),
            status: JobStatus::Running,
            queued: 0,
            in_flight: 0,
            pages_captured,
            pages_failed: 0,
            pages_skipped_by_limit: 0,
            pages_found: pages_captured,
            current_urls: vec![],
        }
    }

    #[tokio::test]
    async fn reader_sees_latest_after_missing_intermediate_updates() {
        let (writer, mut reader) = channel(snapshot(0));
        writer.publish(snapshot(1));
        writer.publish(snapshot(2));
        writer.publish(snapshot(3));

        let seen = reader.changed().await.unwrap();
        assert_eq!(seen.pages_captured, 3);
    }

    #[tokio::test]
    async fn latest_without_waiting() {
        let (writer, reader) = channel(snapshot(0));
        writer.publish(snapshot(5));
        assert_eq!(reader.latest().pages_captured, 5);
    }

    #[tokio::test]
    async fn publish_after_readers_dropped_does_not_panic() {
        let (writer, reader) = channel(snapshot(0));
        drop(reader);
        writer.publish(snapshot(1));
    }
}
