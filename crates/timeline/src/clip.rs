// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clip a raw state event to a query window, yielding a closed interval.

use crate::model::{Source, StateValue, TimeMs, TimelineEvent};

/// An event clipped to `[rangeStartMs, nowMs]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedInterval {
    pub state: StateValue,
    pub source: Source,
    pub reason: String,
    pub repo_root: Option<String>,
    pub started_at_ms: TimeMs,
    pub ended_at_ms: TimeMs,
    pub is_open: bool,
}

impl ClippedInterval {
    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }
}

/// Clip `event` to the window `[range_start_ms, now_ms]`.
///
/// Returns `None` if the clipped interval would be empty (the event lies
/// entirely outside the window, or ends at-or-before it starts).
pub fn clip_event(
    event: &TimelineEvent,
    range_start_ms: TimeMs,
    now_ms: TimeMs,
) -> Option<ClippedInterval> {
    let started_at_ms = event.started_at.max(range_start_ms);
    let raw_end = event.ended_at.unwrap_or(now_ms);
    let ended_at_ms = raw_end.min(now_ms);

    if ended_at_ms <= started_at_ms {
        return None;
    }

    let is_open = event.ended_at.is_none() && ended_at_ms == now_ms;

    Some(ClippedInterval {
        state: event.state,
        source: event.source,
        reason: event.reason.clone(),
        repo_root: event.repo_root.clone(),
        started_at_ms,
        ended_at_ms,
        is_open,
    })
}

#[cfg(test)]
#[path = "clip_tests.rs"]
mod tests;
