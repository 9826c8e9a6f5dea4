// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sweep boundaries, resolve the dominant state/source per segment, and
//! coalesce adjacent runs. The priority list encodes the product rule: a
//! permission prompt anywhere dominates; running anywhere beats idle;
//! unknown loses to everything.

use crate::boundary::build_boundaries;
use crate::clip::ClippedInterval;
use crate::model::{Source, StateValue, TimeMs};

/// One emitted aggregated segment, in ascending time order. The caller
/// (the store) is responsible for the final descending sort + id
/// assignment across both `getTimeline` and `getRepoTimeline` call paths.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSegment {
    pub state: StateValue,
    pub source: Source,
    pub reason: String,
    pub started_at_ms: TimeMs,
    pub ended_at_ms: TimeMs,
    pub is_open: bool,
}

impl AggregatedSegment {
    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }
}

/// Aggregate a set of already-clipped intervals (from any number of panes)
/// over `[range_start_ms, now_ms]`, labeling newly emitted segments with
/// `reason`.
pub fn aggregate(
    intervals: &[ClippedInterval],
    range_start_ms: TimeMs,
    now_ms: TimeMs,
    reason: &str,
) -> Vec<AggregatedSegment> {
    let boundaries = build_boundaries(intervals, range_start_ms, now_ms);
    let mut out: Vec<AggregatedSegment> = Vec::new();

    for window in boundaries.windows(2) {
        let (b_i, b_next) = (window[0], window[1]);

        let active: Vec<&ClippedInterval> =
            intervals.iter().filter(|iv| iv.started_at_ms < b_next && iv.ended_at_ms > b_i).collect();

        if active.is_empty() {
            continue;
        }

        let state = dominant_state(&active);
        let source = dominant_source(&active);
        let is_open =
            b_next == now_ms && active.iter().any(|iv| iv.is_open && iv.ended_at_ms == now_ms);

        if let Some(last) = out.last_mut() {
            if last.state == state && last.is_open == is_open && last.ended_at_ms == b_i {
                last.ended_at_ms = b_next;
                last.source = source;
                continue;
            }
        }

        out.push(AggregatedSegment {
            state,
            source,
            reason: reason.to_owned(),
            started_at_ms: b_i,
            ended_at_ms: b_next,
            is_open,
        });
    }

    out
}

fn dominant_state(active: &[&ClippedInterval]) -> StateValue {
    for candidate in StateValue::PRIORITY {
        if active.iter().any(|iv| iv.state == candidate) {
            return candidate;
        }
    }
    StateValue::Unknown
}

fn dominant_source(active: &[&ClippedInterval]) -> Source {
    if active.iter().any(|iv| iv.source == Source::Hook) {
        Source::Hook
    } else if active.iter().any(|iv| iv.source == Source::Restore) {
        Source::Restore
    } else {
        Source::Poll
    }
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
