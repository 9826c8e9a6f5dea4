// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compute the sorted set of transition points over a set of intervals.
//! Used only by the aggregator (C4).

use crate::clip::ClippedInterval;
use crate::model::TimeMs;

/// Return the sorted, de-duplicated set of
/// `{range_start_ms, now_ms} ∪ ⋃{started_at_ms, ended_at_ms}`.
pub fn build_boundaries(
    intervals: &[ClippedInterval],
    range_start_ms: TimeMs,
    now_ms: TimeMs,
) -> Vec<TimeMs> {
    let mut points: Vec<TimeMs> = Vec::with_capacity(intervals.len() * 2 + 2);
    points.push(range_start_ms);
    points.push(now_ms);
    for interval in intervals {
        points.push(interval.started_at_ms);
        points.push(interval.ended_at_ms);
    }
    points.sort_unstable();
    points.dedup();
    points
}

#[cfg(test)]
#[path = "boundary_tests.rs"]
mod tests;
