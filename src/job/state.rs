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

//! The scheduler's in-memory state: one job's queue, in-flight
//! set, and every dedup/accounting structure the worker loop consults
//! before admitting a URL. All of it lives behind a single `std::sync::Mutex`
//! — every method here is synchronous and returns quickly, so no worker ever
//! holds the lock across an `.await`.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::canonical::{first_matching_seed, in_scope, CanonicalUrl, ScopeMode};

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub url: CanonicalUrl,
    pub seed_index: usize,
    pub depth: u32,
}

/// Why a discovered URL was not queued. Every variant is informational only
/// — none of them is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    OutOfScope,
    AlreadySeen,
    PageLimitReached,
    ExternalHopsExhausted,
}

pub struct JobState {
    pub job_id: String,
    pub seeds: Vec<CanonicalUrl>,
    pub scope_mode: ScopeMode,
    pub page_limit_per_seed: Option<u32>,
    pub follow_external: bool,
    pub max_external_hops: u8,

    queue: VecDeque<QueueItem>,
    in_flight: HashSet<CanonicalUrl>,
    /// Every canonical URL that has been captured or folded into an
    /// existing page as an alternate — the durable "don't requeue" set.
    completed: HashSet<CanonicalUrl>,
    skipped_by_limit: HashSet<CanonicalUrl>,
    per_seed_count: Vec<u32>,
    /// content hash -> page id, for folding byte-identical renders under
    /// different URLs into one stored page.
    dedup_by_hash: HashMap<String, String>,
    cancelled: bool,
    pages_captured: u32,
    pages_failed: u32,
    pages_skipped_by_limit: u32,
}

impl JobState {
    pub fn new(
        job_id: String,
        seeds: Vec<CanonicalUrl>,
        scope_mode: ScopeMode,
        page_limit_per_seed: Option<u32>,
        follow_external: bool,
        max_external_hops: u8,
    ) -> Self {
        let per_seed_count = vec![0; seeds.len()];
        Self {
            job_id,
            seeds,
            scope_mode,
            page_limit_per_seed,
            follow_external,
            max_external_hops,
            queue: VecDeque::new(),
            in_flight: HashSet::new(),
            completed: HashSet::new(),
            skipped_by_limit: HashSet::new(),
            per_seed_count,
            dedup_by_hash: HashMap::new(),
            cancelled: false,
            pages_captured: 0,
            pages_failed: 0,
            pages_skipped_by_limit: 0,
        }
    }

    /// Re-seeds completed/dedup state from a store's view of previously
    /// captured pages on resume. Counts against the per-seed limit are
    /// restored from `Page.seed_index` so a resumed job doesn't recapture
    /// past its own limit.
    pub fn restore_from_pages(&mut self, pages: &[crate::store::Page]) {
        for page in pages {
            if let Some(canonical) = parse_canonical(&page.canonical_url) {
                self.completed.insert(canonical.clone());
                for alt in &page.alternate_urls {
                    if let Some(alt_canonical) = parse_canonical(alt) {
                        self.completed.insert(alt_canonical);
                    }
                }
            }
            self.dedup_by_hash
                .insert(page.content_hash.clone(), page.id.clone());
            if let Some(count) = self.per_seed_count.get_mut(page.seed_index) {
                *count += 1;
            }
            self.pages_captured += 1;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn pages_captured(&self) -> u32 {
        self.pages_captured
    }

    pub fn pages_failed(&self) -> u32 {
        self.pages_failed
    }

    pub fn pages_skipped_by_limit(&self) -> u32 {
        self.pages_skipped_by_limit
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight_urls(&self) -> Vec<String> {
        self.in_flight.iter().map(|u| u.as_str().to_string()).collect()
    }

    /// `|completed| + |inFlight| + |queue| + |skippedByLimit|` — every URL
    /// this job has ever admitted, regardless of what happened to it since.
    pub fn pages_found(&self) -> u32 {
        (self.completed.len() + self.in_flight.len() + self.queue.len() + self.skipped_by_limit.len())
            as u32
    }

    /// Attempts to seed a top-level URL for `seed_index` at depth 0. Seeds
    /// bypass the scope check (they define scope) but still dedup.
    pub fn enqueue_seed(&mut self, seed_index: usize) -> bool {
        let url = self.seeds[seed_index].clone();
        if self.already_seen(&url) {
            return false;
        }
        self.queue.push_back(QueueItem {
            url,
            seed_index,
            depth: 0,
        });
        true
    }

    /// Attempts to admit a link discovered while rendering a page owned by
    /// `parent_seed_index` at `parent_depth`. A candidate in scope of more
    /// than one seed is attributed to the earliest matching seed, not
    /// necessarily its parent's — `parent_seed_index` is only a fallback for
    /// the external-hop case. `depth` counts out-of-scope hops only: every
    /// in-scope candidate is depth 0, regardless of its position in the URL
    /// hierarchy.
    pub fn try_enqueue_discovered(
        &mut self,
        candidate: &CanonicalUrl,
        parent: &CanonicalUrl,
        parent_seed_index: usize,
        parent_depth: u32,
    ) -> Result<(), RejectReason> {
        let matched_seed = first_matching_seed(candidate, &self.seeds, self.scope_mode);

        let (seed_index, depth) = match matched_seed {
            Some(matched) => (matched, 0),
            None => {
                if !self.follow_external {
                    return Err(RejectReason::OutOfScope);
                }
                let parent_seed = &self.seeds[parent_seed_index];
                let parent_hops = if in_scope(parent, parent_seed, self.scope_mode) {
                    0
                } else {
                    parent_depth
                };
                let hops = parent_hops + 1;
                if hops > self.max_external_hops as u32 {
                    return Err(RejectReason::ExternalHopsExhausted);
                }
                (parent_seed_index, hops)
            }
        };

        if self.already_seen(candidate) {
            return Err(RejectReason::AlreadySeen);
        }

        if let Some(limit) = self.page_limit_per_seed {
            if self.per_seed_count[seed_index] + (self.queue_count_for_seed(seed_index) as u32)
                >= limit
            {
                self.skipped_by_limit.insert(candidate.clone());
                self.pages_skipped_by_limit += 1;
                return Err(RejectReason::PageLimitReached);
            }
        }

        self.queue.push_back(QueueItem {
            url: candidate.clone(),
            seed_index,
            depth,
        });
        Ok(())
    }

    fn queue_count_for_seed(&self, seed_index: usize) -> usize {
        self.queue.iter().filter(|i| i.seed_index == seed_index).count()
    }

    fn already_seen(&self, url: &CanonicalUrl) -> bool {
        self.completed.contains(url)
            || self.in_flight.contains(url)
            || self.skipped_by_limit.contains(url)
            || self.queue.iter().any(|i| &i.url == url)
    }

    /// Pops the next item to render, moving it into the in-flight set.
    pub fn dequeue(&mut self) -> Option<QueueItem> {
        let item = self.queue.pop_front()?;
        self.in_flight.insert(item.url.clone());
        Some(item)
    }

    pub fn find_duplicate_page_id(&self, content_hash: &str) -> Option<String> {
        self.dedup_by_hash.get(content_hash).cloned()
    }

    /// Records a freshly rendered, freshly saved page: the one branch that
    /// counts against the per-seed limit and `pagesProcessed`.
    pub fn mark_captured(&mut self, item: &QueueItem, content_hash: &str, page_id: &str) {
        self.in_flight.remove(&item.url);
        self.completed.insert(item.url.clone());
        self.dedup_by_hash
            .entry(content_hash.to_string())
            .or_insert_with(|| page_id.to_string());
        self.per_seed_count[item.seed_index] += 1;
        self.pages_captured += 1;
    }

    /// Records a render whose content hash matched an existing page within
    /// this job: the URL is resolved (folded into the existing page as an
    /// alternate) but doesn't count as a newly processed page or consume the
    /// per-seed limit.
    pub fn mark_duplicate(&mut self, item: &QueueItem) {
        self.in_flight.remove(&item.url);
        self.completed.insert(item.url.clone());
    }

    pub fn mark_failed(&mut self, item: &QueueItem) {
        self.in_flight.remove(&item.url);
        self.pages_failed += 1;
    }

    /// Releases an in-flight item without counting it as failed — used when
    /// a render is abandoned because the job was cancelled, not because it
    /// errored.
    pub fn release_in_flight(&mut self, item: &QueueItem) {
        self.in_flight.remove(&item.url);
    }

    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }
}

fn parse_canonical(s: &str) -> Option<CanonicalUrl> {
    crate::canonical::canonicalize(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;

    fn cu(s: &str) -> CanonicalUrl {
        canonicalize(s, true).unwrap()
    }

    fn fresh_state() -> JobState {
        JobState::new(
            "job-1".to_string(),
            vec![cu("https://example.com/docs")],
            ScopeMode::Strict,
            None,
            false,
            1,
        )
    }

    #[test]
    fn seed_enqueues_once() {
        let mut state = fresh_state();
        assert!(state.enqueue_seed(0));
        let item = state.dequeue().unwrap();
        assert_eq!(item.depth, 0);
    }

    #[test]
    fn duplicate_discovered_url_is_rejected() {
        let mut state = fresh_state();
        state.enqueue_seed(0);
        let item = state.dequeue().unwrap();
        let candidate = cu("https://example.com/docs/page");
        assert!(state
            .try_enqueue_discovered(&candidate, &item.url, item.seed_index, item.depth)
            .is_ok());
        assert_eq!(
            state.try_enqueue_discovered(&candidate, &item.url, item.seed_index, item.depth),
            Err(RejectReason::AlreadySeen)
        );
    }

    #[test]
    fn out_of_scope_rejected_when_not_following_external() {
        let mut state = fresh_state();
        let seed = state.seeds[0].clone();
        let candidate = cu("https://other.com/x");
        assert_eq!(
            state.try_enqueue_discovered(&candidate, &seed, 0, 0),
            Err(RejectReason::OutOfScope)
        );
    }

    #[test]
    fn per_seed_limit_enforced() {
        let mut state = JobState::new(
            "job-1".to_string(),
            vec![cu("https://example.com/docs")],
            ScopeMode::Strict,
            Some(1),
            false,
            1,
        );
        state.enqueue_seed(0);
        let item = state.dequeue().unwrap();
        let parent = item.url.clone();
        state.mark_captured(&item, "hash-a", "page-a");

        let candidate = cu("https://example.com/docs/more");
        assert_eq!(
            state.try_enqueue_discovered(&candidate, &parent, 0, 0),
            Err(RejectReason::PageLimitReached)
        );
        assert_eq!(state.pages_skipped_by_limit(), 1);
    }

    #[test]
    fn drained_when_queue_and_in_flight_empty() {
        let mut state = fresh_state();
        assert!(state.is_drained());
        state.enqueue_seed(0);
        assert!(!state.is_drained());
        let item = state.dequeue().unwrap();
        assert!(!state.is_drained());
        state.mark_captured(&item, "h", "p");
        assert!(state.is_drained());
    }

    #[test]
    fn mark_duplicate_does_not_count_as_processed() {
        let mut state = fresh_state();
        state.enqueue_seed(0);
        let item = state.dequeue().unwrap();
        state.mark_duplicate(&item);
        assert_eq!(state.pages_captured(), 0);
        assert!(state.completed.contains(&item.url));
    }

    #[test]
    fn mark_duplicate_does_not_consume_seed_limit() {
        let mut state = JobState::new(
            "job-1".to_string(),
            vec![cu("https://example.com/docs")],
            ScopeMode::Strict,
            Some(1),
            false,
            1,
        );
        state.enqueue_seed(0);
        let first = state.dequeue().unwrap();
        state.mark_duplicate(&first);

        let candidate = cu("https://example.com/docs/more");
        assert!(state
            .try_enqueue_discovered(&candidate, &first.url, 0, 0)
            .is_ok());
    }

    #[test]
    fn discovered_url_attributed_to_earliest_matching_seed() {
        let mut state = JobState::new(
            "job-1".to_string(),
            vec![cu("https://example.com/docs"), cu("https://example.com/docs/nested")],
            ScopeMode::Loose,
            None,
            false,
            1,
        );
        let parent = cu("https://example.com/docs/nested/page");
        let candidate = cu("https://example.com/docs/nested/child");
        state
            .try_enqueue_discovered(&candidate, &parent, 1, 0)
            .unwrap();
        let item = state.dequeue().unwrap();
        assert_eq!(item.seed_index, 0);
    }

    #[test]
    fn in_scope_children_are_depth_zero() {
        let mut state = JobState::new(
            "job-1".to_string(),
            vec![cu("https://example.com/docs")],
            ScopeMode::Loose,
            None,
            false,
            2,
        );
        let parent = cu("https://example.com/docs/a/b/c");
        let candidate = cu("https://example.com/docs/a/b/c/d");
        state.try_enqueue_discovered(&candidate, &parent, 0, 0).unwrap();
        let item = state.dequeue().unwrap();
        assert_eq!(item.depth, 0);
    }

    #[test]
    fn external_hops_increment_depth_and_are_eventually_exhausted() {
        let mut state = JobState::new(
            "job-1".to_string(),
            vec![cu("https://example.com/docs")],
            ScopeMode::Strict,
            None,
            true,
            1,
        );
        let seed = state.seeds[0].clone();
        let first_hop = cu("https://other.com/a");
        state.try_enqueue_discovered(&first_hop, &seed, 0, 0).unwrap();
        let item = state.dequeue().unwrap();
        assert_eq!(item.depth, 1);

        let second_hop = cu("https://other.com/b");
        assert_eq!(
            state.try_enqueue_discovered(&second_hop, &first_hop, 0, item.depth),
            Err(RejectReason::ExternalHopsExhausted)
        );
    }

    #[test]
    fn pages_found_sums_every_admitted_url() {
        let mut state = fresh_state();
        state.enqueue_seed(0);
        assert_eq!(state.pages_found(), 1);
        let item = state.dequeue().unwrap();
        assert_eq!(state.pages_found(), 1);
        state.mark_captured(&item, "h", "p");
        assert_eq!(state.pages_found(), 1);
    }
}
