// ABOUTME: Tests for the idle-session monitor - counter aging and threshold eviction.
// ABOUTME: Sessions in any non-Pending status must never be touched by a sweep.

use std::sync::Arc;

use parley_core::model::{ChatSession, SessionStatus};
use parley_core::monitor::{SessionMonitor, DEFAULT_MISSED_POLL_THRESHOLD};
use parley_core::store::Store;

fn session_with(id: &str, status: SessionStatus, missed_polls: i64) -> ChatSession {
    ChatSession {
        id: id.to_string(),
        status,
        agent_id: None,
        created_at: chrono::Utc::now().to_rfc3339(),
        completed_at: None,
        missed_polls,
        revision: 0,
    }
}

fn setup() -> (Arc<Store>, SessionMonitor) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let monitor = SessionMonitor::new(Arc::clone(&store), DEFAULT_MISSED_POLL_THRESHOLD);
    (store, monitor)
}

#[test]
fn test_sweep_increments_below_threshold() {
    let (store, monitor) = setup();
    store
        .insert_session(&session_with("s-1", SessionStatus::Pending, 2))
        .unwrap();

    let stats = monitor.sweep().unwrap();
    assert_eq!(stats.swept, 1);
    assert_eq!(stats.evicted, 0);

    let session = store.get_session("s-1").unwrap().unwrap();
    assert_eq!(session.missed_polls, 3);
    assert_eq!(session.status, SessionStatus::Pending);
}

#[test]
fn test_sweep_evicts_past_threshold() {
    let (store, monitor) = setup();
    store
        .insert_session(&session_with("s-1", SessionStatus::Pending, 3))
        .unwrap();

    let stats = monitor.sweep().unwrap();
    assert_eq!(stats.evicted, 1);

    let session = store.get_session("s-1").unwrap().unwrap();
    assert_eq!(session.missed_polls, 4);
    assert_eq!(session.status, SessionStatus::InActive);
}

#[test]
fn test_sweep_ignores_non_pending_sessions() {
    let (store, monitor) = setup();
    store
        .insert_session(&session_with("s-progress", SessionStatus::InProgress, 0))
        .unwrap();
    store
        .insert_session(&session_with("s-done", SessionStatus::Completed, 0))
        .unwrap();
    store
        .insert_session(&session_with("s-dead", SessionStatus::InActive, 9))
        .unwrap();

    let stats = monitor.sweep().unwrap();
    assert_eq!(stats.swept, 0);

    for id in ["s-progress", "s-done", "s-dead"] {
        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.revision, 0);
    }
}

#[test]
fn test_consecutive_sweeps_age_a_session_to_eviction() {
    let (store, monitor) = setup();
    store
        .insert_session(&session_with("s-1", SessionStatus::Pending, 0))
        .unwrap();

    // Threshold 3: the fourth sweep pushes the counter to 4 and evicts.
    for expected in 1..=3 {
        monitor.sweep().unwrap();
        let session = store.get_session("s-1").unwrap().unwrap();
        assert_eq!(session.missed_polls, expected);
        assert_eq!(session.status, SessionStatus::Pending);
    }

    let stats = monitor.sweep().unwrap();
    assert_eq!(stats.evicted, 1);
    let session = store.get_session("s-1").unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::InActive);
}

#[test]
fn test_evicted_session_is_not_swept_again() {
    let (store, monitor) = setup();
    store
        .insert_session(&session_with("s-1", SessionStatus::Pending, 5))
        .unwrap();

    monitor.sweep().unwrap();
    let after_first = store.get_session("s-1").unwrap().unwrap();
    assert_eq!(after_first.status, SessionStatus::InActive);
    let frozen_polls = after_first.missed_polls;

    let stats = monitor.sweep().unwrap();
    assert_eq!(stats.swept, 0);
    let after_second = store.get_session("s-1").unwrap().unwrap();
    assert_eq!(after_second.missed_polls, frozen_polls);
}
