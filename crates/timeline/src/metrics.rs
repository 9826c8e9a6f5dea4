// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repo activity metrics: sum, union (Lebesgue measure), counts, and the
//! retention-approximation flag. Kept as a standalone module — its
//! union-measure algorithm is reusable and independently testable from the
//! store that calls it.

use crate::model::TimeMs;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoActivityMetrics {
    pub running_ms: u64,
    pub running_union_ms: u64,
    pub execution_count: u64,
    pub total_pane_count: usize,
    pub active_pane_count: usize,
    pub approximate: bool,
    pub approximation_reason: Option<String>,
}

/// The Lebesgue measure of the union of `(start, end)` intervals: sort by
/// start, sweep maintaining a running `(cur_start, cur_end)`, extending on
/// overlap and flushing on a gap.
pub fn union_measure(intervals: &mut [(TimeMs, TimeMs)]) -> u64 {
    if intervals.is_empty() {
        return 0;
    }
    intervals.sort_by_key(|(start, _)| *start);

    let mut total: u64 = 0;
    let (mut cur_start, mut cur_end) = intervals[0];

    for &(start, end) in &intervals[1..] {
        if start <= cur_end {
            cur_end = cur_end.max(end);
        } else {
            total += cur_end.saturating_sub(cur_start);
            cur_start = start;
            cur_end = end;
        }
    }
    total += cur_end.saturating_sub(cur_start);
    total
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
