// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::*;

fn counter() -> (Arc<AtomicUsize>, Handler) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let handler: Handler = Arc::new(move |_: &Value| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (count, handler)
}

#[test]
fn journal_event_reaches_only_matching_subscriber() {
    let dispatcher = EventDispatcher::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let _ai = dispatcher.on("journal_ai_complete", move |msg| sink.lock().push(msg.clone()));
    let (other_count, other) = counter();
    let _other = dispatcher.subscribe("other_event", other);

    let msg = json!({"event": "journal_ai_complete", "entry_id": "e1", "mood": "Happy"});
    assert_eq!(dispatcher.dispatch(&msg), 1);

    assert_eq!(*received.lock(), vec![msg]);
    assert_eq!(other_count.load(Ordering::SeqCst), 0);
}

#[test]
fn unsubscribe_removes_only_that_handler() {
    let dispatcher = EventDispatcher::new();
    let (a_count, a) = counter();
    let (b_count, b) = counter();
    let (y_count, y) = counter();
    let sub_a = dispatcher.subscribe("x", a);
    let _sub_b = dispatcher.subscribe("x", b);
    let _sub_y = dispatcher.subscribe("y", y);

    sub_a.unsubscribe();
    dispatcher.dispatch(&json!({"event": "x"}));
    dispatcher.dispatch(&json!({"event": "y"}));

    assert_eq!(a_count.load(Ordering::SeqCst), 0);
    assert_eq!(b_count.load(Ordering::SeqCst), 1);
    assert_eq!(y_count.load(Ordering::SeqCst), 1);
}

#[test]
fn same_handler_under_two_events_is_removed_independently() {
    let dispatcher = EventDispatcher::new();
    let (count, handler) = counter();
    let sub_x = dispatcher.subscribe("x", Arc::clone(&handler));
    let _sub_y = dispatcher.subscribe("y", handler);

    sub_x.unsubscribe();
    assert_eq!(dispatcher.listener_count("x"), 0);
    assert_eq!(dispatcher.listener_count("y"), 1);

    dispatcher.dispatch(&json!({"event": "y"}));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_registration_is_a_set_insert() {
    let dispatcher = EventDispatcher::new();
    let (count, handler) = counter();
    let _first = dispatcher.subscribe("x", Arc::clone(&handler));
    let _second = dispatcher.subscribe("x", handler);

    assert_eq!(dispatcher.listener_count("x"), 1);
    dispatcher.dispatch(&json!({"event": "x"}));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn last_unsubscribe_drops_event_entry() {
    let dispatcher = EventDispatcher::new();
    let (_, handler) = counter();
    let sub = dispatcher.subscribe("x", handler);
    assert_eq!(dispatcher.events(), vec!["x".to_owned()]);

    sub.unsubscribe();
    assert!(dispatcher.events().is_empty());
}

#[yare::parameterized(
    no_event_field = { json!({"entry_id": "e1"}) },
    non_string_event = { json!({"event": 42}) },
    not_an_object = { json!(["event", "x"]) },
    unknown_event = { json!({"event": "nobody_listens"}) },
)]
fn undeliverable_messages_are_dropped(msg: Value) {
    let dispatcher = EventDispatcher::new();
    let (count, handler) = counter();
    let _sub = dispatcher.subscribe("x", handler);
    assert_eq!(dispatcher.dispatch(&msg), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn handler_may_unsubscribe_itself_during_dispatch() {
    let dispatcher = EventDispatcher::new();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let inner = Arc::clone(&slot);
    let sub = dispatcher.on("once", move |_| {
        if let Some(sub) = inner.lock().take() {
            sub.unsubscribe();
        }
    });
    *slot.lock() = Some(sub);

    assert_eq!(dispatcher.dispatch(&json!({"event": "once"})), 1);
    assert_eq!(dispatcher.dispatch(&json!({"event": "once"})), 0);
}
