// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `serialize`/`restore` — the store's snapshot/restore contract. Kept
//! apart from `store.rs` per the "maps with deletion during iteration"
//! design note: the intermediate sort buffer is built fully before being
//! written back, so the store is never observed half-rebuilt.

use crate::model::{parse_sequence_from_id, TimeMs, TimelineEvent};
use crate::store::{PersistedEvents, TimelineStore};

pub(crate) fn restore(store: &mut TimelineStore, persisted: PersistedEvents) {
    store.clear_events();

    let mut max_sequence: u64 = 0;

    for (pane_id, mut events) in persisted {
        events.sort_by_key(|e| e.started_at);

        let mut rebuilt: Vec<TimelineEvent> = Vec::with_capacity(events.len());
        let mut last_boundary: Option<TimeMs> = None;

        for (index, event) in events.iter().enumerate() {
            let mut started_at = event.started_at;
            if let Some(prev) = last_boundary {
                if started_at < prev {
                    started_at = prev;
                }
            }

            let mut ended_at = event.ended_at;
            if ended_at.is_none() {
                if let Some(next) = events.get(index + 1) {
                    ended_at = Some(next.started_at);
                }
            }
            if let Some(end) = ended_at {
                let clamped_end = if end < started_at { started_at } else { end };
                if clamped_end == started_at {
                    // Zero-length after clamping; skip silently.
                    continue;
                }
                ended_at = Some(clamped_end);
            }

            let sequence = parse_sequence_from_id(&event.id);
            max_sequence = max_sequence.max(sequence);
            last_boundary = Some(ended_at.unwrap_or(started_at));

            rebuilt.push(TimelineEvent {
                id: event.id.clone(),
                pane_id: event.pane_id.clone(),
                state: event.state,
                reason: event.reason.clone(),
                source: event.source,
                repo_root: event.repo_root.clone(),
                started_at,
                ended_at,
            });
        }

        store.replace_pane_events(pane_id, rebuilt);
    }

    store.bump_sequence_floor(max_sequence);
    store.prune_all();
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
