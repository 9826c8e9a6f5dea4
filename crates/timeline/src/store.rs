// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Timeline Store: owns events per pane, records the state-machine
//! edge, prunes by retention, and answers range-bounded queries.
//!
//! Kept as one explicit struct with plain methods rather than a bundle of
//! closures over captured state — every test-visible behavior is a method
//! call, nothing hides in an environment. All query methods take `&mut
//! self`: `getRepoTimeline` must prune each participating pane before
//! clipping, so every query path is written as a (cheap, in-memory)
//! mutating pass rather than splitting read/write halves for a store that
//! is always wrapped behind a single lock at the composition root anyway
//! (see the concurrency model this crate implements).

use std::collections::{HashMap, HashSet};

use crate::aggregate::aggregate;
use crate::clip::clip_event;
use crate::clock::Clock;
use crate::error::TimelineError;
use crate::metrics::{union_measure, RepoActivityMetrics};
use crate::model::{make_id, RangeTag, Source, StateValue, TimeMs, TimelineEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;
pub const DEFAULT_MAX_ITEMS_PER_PANE: usize = 1000;

/// Input to [`TimelineStore::record`].
#[derive(Debug, Clone)]
pub struct RecordInput {
    pub pane_id: String,
    pub state: StateValue,
    pub reason: String,
    pub at: Option<TimeMs>,
    pub source: Source,
    pub repo_root: Option<String>,
}

impl RecordInput {
    pub fn new(pane_id: impl Into<String>, state: StateValue, reason: impl Into<String>) -> Self {
        Self {
            pane_id: pane_id.into(),
            state,
            reason: reason.into(),
            at: None,
            source: Source::Poll,
            repo_root: None,
        }
    }

    pub fn at(mut self, at_ms: TimeMs) -> Self {
        self.at = Some(at_ms);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn repo_root(mut self, repo_root: impl Into<String>) -> Self {
        self.repo_root = Some(repo_root.into());
        self
    }
}

/// Query for [`TimelineStore::get_timeline`].
#[derive(Debug, Clone)]
pub struct TimelineQuery {
    pub pane_id: String,
    pub range: RangeTag,
    pub limit: Option<usize>,
}

impl TimelineQuery {
    pub fn new(pane_id: impl Into<String>) -> Self {
        Self { pane_id: pane_id.into(), range: RangeTag::OneHour, limit: None }
    }

    pub fn range(mut self, range: RangeTag) -> Self {
        self.range = range;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Query for [`TimelineStore::get_repo_timeline`].
#[derive(Debug, Clone)]
pub struct RepoTimelineQuery {
    pub pane_id: String,
    pub pane_ids: Vec<String>,
    pub range: RangeTag,
    pub limit: Option<usize>,
    pub aggregate_reason: String,
    pub item_id_prefix: String,
}

impl RepoTimelineQuery {
    pub fn new(pane_id: impl Into<String>, pane_ids: Vec<String>) -> Self {
        Self {
            pane_id: pane_id.into(),
            pane_ids,
            range: RangeTag::OneHour,
            limit: None,
            aggregate_reason: "repo:aggregate".to_owned(),
            item_id_prefix: "repo".to_owned(),
        }
    }

    pub fn range(mut self, range: RangeTag) -> Self {
        self.range = range;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Query for [`TimelineStore::get_repo_activity_metrics`].
#[derive(Debug, Clone)]
pub struct RepoMetricsQuery {
    pub repo_root: String,
    pub range: RangeTag,
}

/// One clipped, duration-enriched item in a [`Timeline`]. Field names
/// follow the wire contract (spec.md §4.5 `getTimeline`), not Rust
/// convention: `startedAt`/`endedAt`, not `startedAtMs`/`endedAtMs`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub id: String,
    #[serde(rename = "paneId")]
    pub pane_id: String,
    pub state: StateValue,
    pub reason: String,
    pub source: Source,
    #[serde(rename = "repoRoot")]
    pub repo_root: Option<String>,
    #[serde(rename = "startedAt")]
    pub started_at_ms: TimeMs,
    #[serde(rename = "endedAt")]
    pub ended_at_ms: TimeMs,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "isOpen")]
    pub is_open: bool,
}

/// The result of a timeline query (per-pane or repo-aggregated), per
/// spec.md §3 "Query result (Timeline)".
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    #[serde(rename = "paneId")]
    pub pane_id: String,
    pub now: TimeMs,
    pub range: RangeTag,
    pub items: Vec<TimelineItem>,
    #[serde(rename = "totalsMs")]
    pub totals_ms: HashMap<StateValue, u64>,
    pub current: Option<TimelineItem>,
}

pub type PersistedEvents = HashMap<String, Vec<TimelineEvent>>;

/// Owns per-pane event history and the store-global sequence counter.
pub struct TimelineStore {
    events: HashMap<String, Vec<TimelineEvent>>,
    sequence: AtomicU64,
    clock: Arc<dyn Clock>,
    retention_ms: u64,
    max_items_per_pane: usize,
}

impl TimelineStore {
    pub fn new(clock: Arc<dyn Clock>, retention_ms: u64, max_items_per_pane: usize) -> Self {
        Self { events: HashMap::new(), sequence: AtomicU64::new(0), clock, retention_ms, max_items_per_pane }
    }

    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, DEFAULT_RETENTION_MS, DEFAULT_MAX_ITEMS_PER_PANE)
    }

    fn now_ms(&self) -> TimeMs {
        self.clock.now_ms()
    }

    fn retention_threshold(&self) -> TimeMs {
        self.now_ms().saturating_sub(self.retention_ms)
    }

    fn next_id(&self, pane_id: &str, at_ms: TimeMs) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        make_id(pane_id, at_ms, seq)
    }

    /// Drop events older than retention, then cap at `max_items_per_pane`.
    fn prune(events: &mut Vec<TimelineEvent>, threshold: TimeMs, max_items: usize) {
        events.retain(|e| e.ended_at.is_none() || e.ended_at.unwrap_or(0) >= threshold);
        if events.len() > max_items {
            let overflow = events.len() - max_items;
            events.drain(0..overflow);
        }
    }

    fn prune_pane(&mut self, pane_id: &str) {
        let threshold = self.retention_threshold();
        let max_items = self.max_items_per_pane;
        if let Some(events) = self.events.get_mut(pane_id) {
            Self::prune(events, threshold, max_items);
        }
    }

    /// Record a state-transition event for a pane. No-op on an empty
    /// `pane_id`; never errors — malformed timestamps fall back to `now`.
    pub fn record(&mut self, input: RecordInput) {
        if input.pane_id.is_empty() {
            return;
        }

        let now = self.now_ms();
        let mut at_ms = input.at.unwrap_or(now);

        self.prune_pane(&input.pane_id);

        let entry = self.events.entry(input.pane_id.clone()).or_default();

        if let Some(last) = entry.last() {
            let last_boundary = last.ended_at.unwrap_or(last.started_at);
            if at_ms < last_boundary {
                at_ms = last_boundary;
            }

            let is_open = last.is_open();
            let merges = last.state == input.state && last.repo_root == input.repo_root;
            let close_at = last.started_at.max(at_ms);

            if is_open {
                if let Some(last_mut) = entry.last_mut() {
                    if merges {
                        last_mut.reason = input.reason;
                        last_mut.source = input.source;
                        self.prune_pane(&input.pane_id);
                        return;
                    }
                    last_mut.ended_at = Some(close_at);
                }
            }
        }

        let id = self.next_id(&input.pane_id, at_ms);
        let entry = self.events.entry(input.pane_id.clone()).or_default();
        entry.push(TimelineEvent {
            id,
            pane_id: input.pane_id.clone(),
            state: input.state,
            reason: input.reason,
            source: input.source,
            repo_root: input.repo_root,
            started_at: at_ms,
            ended_at: None,
        });

        self.prune_pane(&input.pane_id);
    }

    /// Close a pane's currently-open event, if any.
    pub fn close_pane(&mut self, pane_id: &str, at: Option<TimeMs>) {
        if pane_id.is_empty() {
            return;
        }
        let now = self.now_ms();
        if let Some(events) = self.events.get_mut(pane_id) {
            if let Some(last) = events.last_mut() {
                if last.is_open() {
                    let at_ms = at.unwrap_or(now);
                    last.ended_at = Some(last.started_at.max(at_ms));
                }
            }
        }
    }

    /// Clear all events and reset the sequence counter.
    pub fn reset(&mut self) {
        self.events.clear();
        self.sequence.store(0, Ordering::SeqCst);
    }

    fn resolve_limit(range: RangeTag, requested: Option<usize>) -> usize {
        requested.unwrap_or_else(|| range.default_limit()).clamp(1, 10_000)
    }

    fn sort_and_truncate(mut items: Vec<TimelineItem>, limit: usize) -> Vec<TimelineItem> {
        items.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        items.truncate(limit);
        items
    }

    /// `getTimeline` — one pane's clipped, duration-enriched event history.
    pub fn get_timeline(&mut self, query: &TimelineQuery) -> Result<Timeline, TimelineError> {
        if query.pane_id.is_empty() {
            return Err(TimelineError::InvalidPayload);
        }

        self.prune_pane(&query.pane_id);

        let now = self.now_ms();
        let range_ms = query.range.width_ms();
        let range_start_ms = now.saturating_sub(range_ms);
        let limit = Self::resolve_limit(query.range, query.limit);

        let mut items = Vec::new();
        let mut totals_ms: HashMap<StateValue, u64> = HashMap::new();

        if let Some(events) = self.events.get(&query.pane_id) {
            for event in events {
                if let Some(clipped) = clip_event(event, range_start_ms, now) {
                    let duration = clipped.duration_ms();
                    *totals_ms.entry(clipped.state).or_insert(0) += duration;
                    items.push(TimelineItem {
                        id: event.id.clone(),
                        pane_id: event.pane_id.clone(),
                        state: clipped.state,
                        reason: clipped.reason,
                        source: clipped.source,
                        repo_root: clipped.repo_root,
                        started_at_ms: clipped.started_at_ms,
                        ended_at_ms: clipped.ended_at_ms,
                        duration_ms: duration,
                        is_open: clipped.is_open,
                    });
                }
            }
        }

        let items = Self::sort_and_truncate(items, limit);
        let current = items.iter().find(|item| item.is_open).cloned();

        Ok(Timeline { pane_id: query.pane_id.clone(), now, range: query.range, items, totals_ms, current })
    }

    /// `getRepoTimeline` — cross-pane aggregation with dominance rules.
    pub fn get_repo_timeline(&mut self, query: &RepoTimelineQuery) -> Result<Timeline, TimelineError> {
        if query.pane_id.is_empty() {
            return Err(TimelineError::InvalidPayload);
        }

        let now = self.now_ms();
        let range_ms = query.range.width_ms();
        let range_start_ms = now.saturating_sub(range_ms);
        let limit = Self::resolve_limit(query.range, query.limit);

        let mut unique_pane_ids: Vec<&String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for pane_id in &query.pane_ids {
            if seen.insert(pane_id.as_str()) {
                unique_pane_ids.push(pane_id);
            }
        }

        let mut intervals = Vec::new();
        for pane_id in &unique_pane_ids {
            self.prune_pane(pane_id);
            if let Some(events) = self.events.get(pane_id.as_str()) {
                for event in events {
                    if let Some(clipped) = clip_event(event, range_start_ms, now) {
                        intervals.push(clipped);
                    }
                }
            }
        }

        if intervals.is_empty() {
            return Ok(Timeline {
                pane_id: query.pane_id.clone(),
                now,
                range: query.range,
                items: Vec::new(),
                totals_ms: HashMap::new(),
                current: None,
            });
        }

        let segments = aggregate(&intervals, range_start_ms, now, &query.aggregate_reason);

        let mut totals_ms: HashMap<StateValue, u64> = HashMap::new();
        let mut items = Vec::with_capacity(segments.len());
        for (index, segment) in segments.into_iter().enumerate() {
            let duration = segment.duration_ms();
            *totals_ms.entry(segment.state).or_insert(0) += duration;
            items.push(TimelineItem {
                id: format!(
                    "{}:{}:{}:{}",
                    query.item_id_prefix, query.pane_id, segment.started_at_ms, index
                ),
                pane_id: query.pane_id.clone(),
                state: segment.state,
                reason: segment.reason,
                source: segment.source,
                repo_root: None,
                started_at_ms: segment.started_at_ms,
                ended_at_ms: segment.ended_at_ms,
                duration_ms: duration,
                is_open: segment.is_open,
            });
        }

        let items = Self::sort_and_truncate(items, limit);
        let current = items.iter().find(|item| item.is_open).cloned();

        Ok(Timeline { pane_id: query.pane_id.clone(), now, range: query.range, items, totals_ms, current })
    }

    /// `getRepoActivityMetrics` — sum/union RUNNING time plus execution count.
    pub fn get_repo_activity_metrics(
        &mut self,
        query: &RepoMetricsQuery,
    ) -> Result<RepoActivityMetrics, TimelineError> {
        if query.repo_root.is_empty() {
            return Err(TimelineError::InvalidPayload);
        }

        let now = self.now_ms();
        let range_ms = query.range.width_ms();
        let range_start_ms = now.saturating_sub(range_ms);

        let pane_ids: Vec<String> = self.events.keys().cloned().collect();
        for pane_id in &pane_ids {
            self.prune_pane(pane_id);
        }

        let mut running_ms: u64 = 0;
        let mut running_intervals: Vec<(TimeMs, TimeMs)> = Vec::new();
        let mut execution_count: u64 = 0;
        let mut total_panes: HashSet<&str> = HashSet::new();
        let mut active_panes: HashSet<&str> = HashSet::new();

        for (pane_id, events) in &self.events {
            let mut contributed = false;
            for event in events {
                if event.repo_root.as_deref() != Some(query.repo_root.as_str()) {
                    continue;
                }
                let Some(clipped) = clip_event(event, range_start_ms, now) else {
                    continue;
                };
                contributed = true;
                if clipped.state == StateValue::Running {
                    running_ms += clipped.duration_ms();
                    running_intervals.push((clipped.started_at_ms, clipped.ended_at_ms));
                    active_panes.insert(pane_id.as_str());
                }
                if event.state == StateValue::Running && event.started_at >= range_start_ms {
                    execution_count += 1;
                }
            }
            if contributed {
                total_panes.insert(pane_id.as_str());
            }
        }

        let running_union_ms = union_measure(&mut running_intervals);
        let approximate = range_ms > self.retention_ms;

        Ok(RepoActivityMetrics {
            running_ms,
            running_union_ms,
            execution_count,
            total_pane_count: total_panes.len(),
            active_pane_count: active_panes.len(),
            approximate,
            approximation_reason: approximate.then(|| "retention_clipped".to_owned()),
        })
    }

    /// `listRepoRoots` — distinct repo roots observed in the window.
    pub fn list_repo_roots(&mut self, range: RangeTag) -> Vec<String> {
        let now = self.now_ms();
        let range_start_ms = now.saturating_sub(range.width_ms());

        let pane_ids: Vec<String> = self.events.keys().cloned().collect();
        for pane_id in &pane_ids {
            self.prune_pane(pane_id);
        }

        let mut roots: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for events in self.events.values() {
            for event in events {
                let Some(root) = event.repo_root.as_deref() else { continue };
                if clip_event(event, range_start_ms, now).is_none() {
                    continue;
                }
                if seen.insert(root) {
                    roots.push(root.to_owned());
                }
            }
        }
        roots
    }

    /// Deep-copy snapshot of all pane events, after a full prune.
    pub fn serialize(&mut self) -> PersistedEvents {
        let pane_ids: Vec<String> = self.events.keys().cloned().collect();
        for pane_id in &pane_ids {
            self.prune_pane(pane_id);
        }
        self.events.clone()
    }

    /// Rebuild the store from a persisted snapshot, re-deriving the
    /// sequence counter and enforcing monotonic time as it walks forward.
    pub fn restore(&mut self, persisted: PersistedEvents) {
        crate::persist::restore(self, persisted);
    }

    // -- accessors used by `persist` ------------------------------------

    pub(crate) fn replace_pane_events(&mut self, pane_id: String, events: Vec<TimelineEvent>) {
        self.events.insert(pane_id, events);
    }

    pub(crate) fn bump_sequence_floor(&mut self, at_least: u64) {
        let current = self.sequence.load(Ordering::SeqCst);
        if at_least > current {
            self.sequence.store(at_least, Ordering::SeqCst);
        }
    }

    pub(crate) fn retention_ms(&self) -> u64 {
        self.retention_ms
    }

    pub(crate) fn max_items_per_pane(&self) -> usize {
        self.max_items_per_pane
    }

    pub(crate) fn clear_events(&mut self) {
        self.events.clear();
    }

    pub(crate) fn prune_all(&mut self) {
        let pane_ids: Vec<String> = self.events.keys().cloned().collect();
        for pane_id in pane_ids {
            self.prune_pane(&pane_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn pane_events(&self, pane_id: &str) -> Vec<TimelineEvent> {
        self.events.get(pane_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
