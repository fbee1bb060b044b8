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

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::RenderSlot;

/// Fixed-size pool of `W` render slots. Acquisition blocks until
/// a slot is idle; every slot is mutually exclusive to its acquirer for the
/// duration of one `render` call. The idle set is a plain `std::sync::Mutex`
/// (critical section is a `VecDeque` pop/push, never held across an await)
/// so release-on-drop doesn't need an async context.
pub struct SlotPool {
    slots: Vec<Arc<dyn RenderSlot>>,
    idle: Mutex<VecDeque<usize>>,
    notify: Notify,
}

impl SlotPool {
    pub fn new(slots: Vec<Arc<dyn RenderSlot>>) -> Self {
        let idle = (0..slots.len()).collect();
        Self {
            slots,
            idle: Mutex::new(idle),
            notify: Notify::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until a slot is idle, then marks it busy.
    pub async fn acquire(self: &Arc<Self>) -> SlotGuard {
        loop {
            {
                let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(index) = idle.pop_front() {
                    return SlotGuard {
                        pool: Arc::clone(self),
                        index: Some(index),
                    };
                }
            }
            self.notify.notified().await;
        }
    }

    /// Closes every slot. Called once after the job's queue and in-flight
    /// set are both empty, or on cancel. Guarantees no dangling contexts.
    pub async fn shutdown(&self) {
        for slot in &self.slots {
            slot.close().await;
        }
    }
}

pub struct SlotGuard {
    pool: Arc<SlotPool>,
    index: Option<usize>,
}

impl SlotGuard {
    pub fn slot(&self) -> &Arc<dyn RenderSlot> {
        &self.pool.slots[self.index.expect("guard already released")]
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(index) = self.index.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(index);
            self.pool.notify.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderOptions, RenderResult};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl RenderSlot for Noop {
        async fn render(
            &self,
            _url: &str,
            _opts: &RenderOptions,
        ) -> Result<RenderResult, crate::render::RenderError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let pool = Arc::new(SlotPool::new(vec![Arc::new(Noop)]));
        let guard = pool.acquire().await;

        let pool2 = Arc::clone(&pool);
        let waiter = tokio::spawn(async move {
            let _g = pool2.acquire().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn size_matches_slot_count() {
        let pool = SlotPool::new(vec![Arc::new(Noop), Arc::new(Noop), Arc::new(Noop)]);
        assert_eq!(pool.size(), 3);
    }
}
