use super::*;
use crate::clock::ManualClock;
use crate::model::{RangeTag, Source, StateValue, TimelineEvent};
use crate::store::{self, RepoMetricsQuery, TimelineQuery, TimelineStore, DEFAULT_MAX_ITEMS_PER_PANE};
use crate::test_support::AnyhowExt;
use std::collections::HashMap;

fn ev(id: &str, pane_id: &str, state: StateValue, started_at: u64, ended_at: Option<u64>) -> TimelineEvent {
    TimelineEvent {
        id: id.to_owned(),
        pane_id: pane_id.to_owned(),
        state,
        reason: "restored".to_owned(),
        source: Source::Poll,
        repo_root: None,
        started_at,
        ended_at,
    }
}

fn store(retention_ms: u64, now_ms: u64) -> TimelineStore {
    TimelineStore::new(ManualClock::new(now_ms), retention_ms, DEFAULT_MAX_ITEMS_PER_PANE)
}

#[test]
fn restore_keeps_closed_events_in_order() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:0:1", "P", StateValue::Running, 0, Some(1_000)),
            ev("P:1000:2", "P", StateValue::Shell, 1_000, Some(2_000)),
        ],
    );

    restore(&mut s, persisted);

    let events = s.pane_events("P");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].state, StateValue::Running);
    assert_eq!(events[1].state, StateValue::Shell);
}

#[test]
fn restore_sorts_out_of_order_input_by_started_at() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:1000:2", "P", StateValue::Shell, 1_000, Some(2_000)),
            ev("P:0:1", "P", StateValue::Running, 0, Some(1_000)),
        ],
    );

    restore(&mut s, persisted);

    let events = s.pane_events("P");
    assert_eq!(events[0].started_at, 0);
    assert_eq!(events[1].started_at, 1_000);
}

#[test]
fn restore_infers_ended_at_from_next_event_start() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:0:1", "P", StateValue::Running, 0, None),
            ev("P:1000:2", "P", StateValue::Shell, 1_000, None),
        ],
    );

    restore(&mut s, persisted);

    let events = s.pane_events("P");
    assert_eq!(events[0].ended_at, Some(1_000));
    assert!(events[1].ended_at.is_none(), "last event in a pane stays open");
}

#[test]
fn restore_clamps_overlapping_started_at_forward() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:0:1", "P", StateValue::Running, 0, Some(5_000)),
            // Overlaps the previous event's boundary; must clamp to 5_000.
            ev("P:2000:2", "P", StateValue::Shell, 2_000, Some(6_000)),
        ],
    );

    restore(&mut s, persisted);

    let events = s.pane_events("P");
    assert_eq!(events[0].ended_at, Some(5_000));
    assert_eq!(events[1].started_at, 5_000);
    assert_eq!(events[1].ended_at, Some(6_000));
}

#[test]
fn restore_skips_zero_length_events_after_clamping() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:0:1", "P", StateValue::Running, 0, Some(5_000)),
            // Starts before the prior event even ends, and ends at the same
            // clamped boundary: zero length after clamping, dropped.
            ev("P:1000:2", "P", StateValue::Shell, 1_000, Some(5_000)),
            ev("P:5000:3", "P", StateValue::WaitingInput, 5_000, None),
        ],
    );

    restore(&mut s, persisted);

    let events = s.pane_events("P");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].state, StateValue::Running);
    assert_eq!(events[1].state, StateValue::WaitingInput);
    assert_eq!(events[1].started_at, 5_000);
}

#[test]
fn restore_raises_ended_at_to_started_at_floor() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    // A corrupt record with an end before its (clamped) start: the end is
    // raised to the start, which then makes it zero-length and it is
    // dropped by the zero-length rule.
    persisted.insert("P".to_owned(), vec![ev("P:5000:1", "P", StateValue::Running, 5_000, Some(1_000))]);

    restore(&mut s, persisted);

    assert!(s.pane_events("P").is_empty());
}

#[test]
fn restore_recovers_sequence_counter_from_event_ids() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:0:7", "P", StateValue::Running, 0, Some(1_000)),
            ev("P:1000:42", "P", StateValue::Shell, 1_000, None),
        ],
    );

    restore(&mut s, persisted);

    // The next record() call must mint an id whose sequence is strictly
    // greater than the highest one recovered from the snapshot (42).
    s.record(crate::store::RecordInput::new("Q", StateValue::Running, "x").at(100_000));
    let id = s.pane_events("Q")[0].id.clone();
    let seq = crate::model::parse_sequence_from_id(&id);
    assert!(seq > 42, "expected sequence > 42, got {seq}");
}

#[test]
fn restore_tolerates_malformed_ids_by_defaulting_sequence_to_zero() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![ev("not-a-real-id", "P", StateValue::Running, 0, None)],
    );

    restore(&mut s, persisted);

    assert_eq!(s.pane_events("P").len(), 1);
}

#[test]
fn restore_clears_prior_state_before_rebuilding() {
    let mut s = store(store::DEFAULT_RETENTION_MS, 100_000);
    s.record(crate::store::RecordInput::new("Stale", StateValue::Running, "x").at(0));
    assert_eq!(s.pane_events("Stale").len(), 1);

    let persisted: PersistedEvents = HashMap::new();
    restore(&mut s, persisted);

    assert!(s.pane_events("Stale").is_empty());
}

#[test]
fn restore_applies_retention_pruning() {
    // now_ms=100_000, retention=10_000 -> threshold=90_000.
    let mut s = store(10_000, 100_000);
    let mut persisted: PersistedEvents = HashMap::new();
    persisted.insert(
        "P".to_owned(),
        vec![
            ev("P:0:1", "P", StateValue::Running, 0, Some(1_000)),
            ev("P:95000:2", "P", StateValue::Shell, 95_000, None),
        ],
    );

    restore(&mut s, persisted);

    let events = s.pane_events("P");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, StateValue::Shell);
}

#[test]
fn serialize_then_restore_round_trips_queryable_state() -> anyhow::Result<()> {
    let mut s = store(store::DEFAULT_RETENTION_MS, 50_000);
    s.record(crate::store::RecordInput::new("P", StateValue::Running, "x").repo_root("/repo").at(0));
    s.record(crate::store::RecordInput::new("P", StateValue::Shell, "y").at(30_000));

    let snapshot = s.serialize();

    let mut restored_store = store(store::DEFAULT_RETENTION_MS, 50_000);
    restored_store.restore(snapshot);

    let before = s.get_timeline(&TimelineQuery::new("P").range(RangeTag::OneHour)).anyhow()?;
    let after = restored_store.get_timeline(&TimelineQuery::new("P").range(RangeTag::OneHour)).anyhow()?;

    assert_eq!(before.items.len(), after.items.len());
    for (b, a) in before.items.iter().zip(after.items.iter()) {
        assert_eq!(b.state, a.state);
        assert_eq!(b.started_at_ms, a.started_at_ms);
        assert_eq!(b.ended_at_ms, a.ended_at_ms);
    }

    let metrics = restored_store
        .get_repo_activity_metrics(&RepoMetricsQuery { repo_root: "/repo".to_owned(), range: RangeTag::OneHour })
        .anyhow()?;
    assert_eq!(metrics.execution_count, 1);
    Ok(())
}
