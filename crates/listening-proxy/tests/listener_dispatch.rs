mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{actions, fixture, new_log, no_listeners, path, paths, record, recorder};
use listening_proxy::{
    create, listener, same_listener, ListenerError, ListenerSpec, Object, PathStep, ProxyError, Value,
    EVENT_TYPE_AFTER_CHANGE, EVENT_TYPE_BEFORE_CHANGE, EVENT_TYPE_EXCEPTION_HANDLER,
};
use serde_json::json;

#[test]
fn listeners_near_the_change_run_first() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let root = create(fixture(json!({"a": {"b": 1}})), no_listeners()).unwrap();
    let a = root.child("a").unwrap();

    for (name, node) in [("root-1", &root), ("a-1", &a), ("root-2", &root), ("a-2", &a)] {
        let order = order.clone();
        node.add_listener(
            EVENT_TYPE_AFTER_CHANGE,
            listener(move |_| {
                order.borrow_mut().push(name);
                Ok(())
            }),
        )
        .unwrap();
    }

    a.set("b", 2).unwrap();
    assert_eq!(*order.borrow(), vec!["a-1", "a-2", "root-1", "root-2"]);
}

#[test]
fn add_listener_is_chainable_and_deduplicates() {
    let log = new_log();
    let root = create(fixture(json!({"a": 1})), no_listeners()).unwrap();
    let handle = recorder(&log);

    root.add_listener(EVENT_TYPE_AFTER_CHANGE, handle.clone())
        .unwrap()
        .add_listener(EVENT_TYPE_AFTER_CHANGE, handle.clone())
        .unwrap();
    root.set("a", 2).unwrap();
    assert_eq!(log.borrow().len(), 1);

    root.remove_listener(EVENT_TYPE_AFTER_CHANGE, &handle).unwrap();
    root.set("a", 3).unwrap();
    assert_eq!(log.borrow().len(), 1);

    assert!(matches!(
        root.add_listener("afterchange", handle.clone()),
        Err(ProxyError::UnknownEventType(_))
    ));
    assert!(matches!(
        root.remove_listener("nope", &handle),
        Err(ProxyError::UnknownEventType(_))
    ));
}

#[test]
fn prevent_default_cancels_the_write_and_the_after_event() {
    let log = new_log();
    let value = fixture(json!({"a": 1}));
    let root = create(value.clone(), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    let veto = listener(|event| {
        event.prevent_default()?;
        Ok(())
    });
    root.add_listener(EVENT_TYPE_BEFORE_CHANGE, veto.clone()).unwrap();

    root.set("a", 2).unwrap();
    root.delete("a").unwrap();
    assert_eq!(value.as_object().unwrap().get("a"), Value::from(1));
    assert!(log.borrow().is_empty());

    root.remove_listener(EVENT_TYPE_BEFORE_CHANGE, &veto).unwrap();
    root.set("a", 2).unwrap();
    assert_eq!(value.as_object().unwrap().get("a"), Value::from(2));
    assert_eq!(actions(&log), vec!["set"]);
}

#[test]
fn perform_default_runs_the_change_once() {
    let log = new_log();
    let root = create(fixture(json!({"items": []})), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    let items = root.child("items").unwrap();
    items
        .add_listener(
            EVENT_TYPE_BEFORE_CHANGE,
            listener(|event| {
                event.perform_default()?;
                event.perform_default()?;
                assert!(event.default_performed());
                Ok(())
            }),
        )
        .unwrap();

    assert_eq!(items.push([Value::from(1)]).unwrap(), Value::from(1usize));
    assert_eq!(items.target().len(), 1);
    assert_eq!(actions(&log), vec!["push()"]);
}

#[test]
fn stop_propagation_keeps_the_event_local() {
    let log = new_log();
    let root = create(fixture(json!({"a": {"b": 1}})), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    let a = root.child("a").unwrap();
    let local = new_log();
    a.add_listener(EVENT_TYPE_AFTER_CHANGE, recorder(&local)).unwrap();
    a.add_listener(
        EVENT_TYPE_AFTER_CHANGE,
        listener(|event| {
            event.stop_propagation();
            Ok(())
        }),
    )
    .unwrap();

    a.set("b", 2).unwrap();
    assert_eq!(local.borrow().len(), 1);
    assert!(log.borrow().is_empty());
}

#[test]
fn shared_child_fires_once_per_slot() {
    let log = new_log();
    let shared = fixture(json!({"x": 1}));
    let list = Object::array([shared.clone(), shared.clone()]);
    let _root = create(list, [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();

    shared.as_proxy().unwrap().set("x", 2).unwrap();
    assert_eq!(
        paths(&log),
        vec![vec![PathStep::Index(0)], vec![PathStep::Index(1)]]
    );
}

#[test]
fn shared_child_fires_once_per_parent() {
    let log = new_log();
    let shared = fixture(json!({"x": 1}));
    let root = create(
        Object::plain([
            ("a", shared.clone()),
            ("b", Value::Object(Object::plain([("c", shared.clone())]))),
        ]),
        [record(EVENT_TYPE_AFTER_CHANGE, &log)],
    )
    .unwrap();

    root.child("a").unwrap().set("x", 2).unwrap();
    assert_eq!(paths(&log), vec![path(&["a"]), path(&["b", "c"])]);
}

#[test]
fn unhandled_listener_failures_are_swallowed() {
    let log = new_log();
    let value = fixture(json!({"a": 1}));
    let root = create(
        value.clone(),
        [
            ListenerSpec::after_change(|_| Err(ListenerError::msg("boom"))),
            record(EVENT_TYPE_AFTER_CHANGE, &log),
        ],
    )
    .unwrap();

    root.set("a", 2).unwrap();
    assert_eq!(value.as_object().unwrap().get("a"), Value::from(2));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn exception_handlers_see_the_failure_and_original_path() {
    let handled = new_log();
    let root = create(
        fixture(json!({"a": {"b": 1}})),
        [
            ListenerSpec::after_change(|_| Err(ListenerError::msg("boom"))),
            record(EVENT_TYPE_EXCEPTION_HANDLER, &handled),
        ],
    )
    .unwrap();

    root.child("a").unwrap().set("b", 2).unwrap();

    let handled = handled.borrow();
    assert_eq!(handled.len(), 1);
    let event = &handled[0];
    assert_eq!(event.exception.as_deref(), Some("boom"));
    assert_eq!(event.path, path(&["a"]));
    let original = event.event.as_deref().unwrap();
    assert_eq!(original.path, path(&["a"]));
    assert_eq!(original.action.as_deref(), Some("set"));
    assert_eq!(original.property, Some(PathStep::from("b")));
}

#[test]
fn exception_handlers_bubble_from_the_failing_node() {
    let handled = new_log();
    let root = create(
        fixture(json!({"a": {"b": 1}})),
        [record(EVENT_TYPE_EXCEPTION_HANDLER, &handled)],
    )
    .unwrap();
    let a = root.child("a").unwrap();
    a.add_listener(
        EVENT_TYPE_AFTER_CHANGE,
        listener(|_| Err(ListenerError::msg("inner"))),
    )
    .unwrap();

    a.set("b", 2).unwrap();
    assert_eq!(paths(&handled), vec![path(&["a"])]);
}

#[test]
fn exception_handlers_know_which_listener_failed() {
    let quiet = listener(|_| Ok(()));
    let failing = listener(|_| Err(ListenerError::msg("inner")));
    let matched = Rc::new(RefCell::new(Vec::new()));
    let sink = matched.clone();
    let expected = failing.clone();
    let root = create(
        fixture(json!({"a": 1})),
        [ListenerSpec::exception_handler(move |event| {
            let handler = event.handler().expect("exception events carry the failing listener");
            sink.borrow_mut().push(same_listener(handler, &expected));
            Ok(())
        })],
    )
    .unwrap();
    root.add_listener(EVENT_TYPE_AFTER_CHANGE, quiet.clone())
        .unwrap()
        .add_listener(EVENT_TYPE_AFTER_CHANGE, failing.clone())
        .unwrap();

    root.set("a", 2).unwrap();
    assert_eq!(*matched.borrow(), vec![true]);
    assert!(!same_listener(&quiet, &failing));
}

#[test]
fn rethrown_exceptions_abort_the_operation() {
    let log = new_log();
    let value = fixture(json!({"a": 1}));
    let root = create(
        value.clone(),
        [
            ListenerSpec::before_change(|_| Err(ListenerError::msg("rejected"))),
            ListenerSpec::exception_handler(|event| match event.exception() {
                Some(exception) => Err(exception.clone()),
                None => Ok(()),
            }),
            record(EVENT_TYPE_AFTER_CHANGE, &log),
        ],
    )
    .unwrap();

    match root.set("a", 2) {
        Err(ProxyError::Listener(err)) => assert_eq!(err.message(), "rejected"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(value.as_object().unwrap().get("a"), Value::from(1));
    assert!(log.borrow().is_empty());
}

#[test]
fn listeners_may_mutate_reentrantly() {
    let value = fixture(json!({"a": 1, "writes": 0}));
    let root = create(value.clone(), no_listeners()).unwrap();
    let handle = root.clone();
    root.add_listener(
        EVENT_TYPE_AFTER_CHANGE,
        listener(move |event| {
            if event.property() == Some(&PathStep::from("a")) {
                let writes = handle.get("writes")?.to_number();
                handle.set("writes", writes + 1.0)?;
            }
            Ok(())
        }),
    )
    .unwrap();

    root.set("a", 2).unwrap();
    root.set("a", 3).unwrap();
    assert_eq!(value.as_object().unwrap().get("writes"), Value::from(2));
}

#[test]
fn get_property_listeners_substitute_results() {
    let value = fixture(json!({"a": 1, "b": 2}));
    let root = create(
        value,
        [ListenerSpec::get_property(|event| {
            let key = event.property().and_then(PathStep::as_key).map(str::to_string);
            match key.as_deref() {
                Some("a") => event.replace_result(42)?,
                Some("b") => event.prevent_default()?,
                _ => {}
            }
            Ok(())
        })],
    )
    .unwrap();

    assert_eq!(root.get("a").unwrap(), Value::from(42));
    assert_eq!(root.get("b").unwrap(), Value::Undefined);
    assert_eq!(root.target().get("a"), Value::from(1));
}

#[test]
fn only_preventable_events_can_be_prevented() {
    let outcome = Rc::new(RefCell::new(None));
    let sink = outcome.clone();
    let root = create(
        fixture(json!({"a": 1})),
        [ListenerSpec::after_change(move |event| {
            *sink.borrow_mut() = Some(event.prevent_default());
            Ok(())
        })],
    )
    .unwrap();

    root.set("a", 2).unwrap();
    assert!(matches!(
        outcome.borrow().as_ref(),
        Some(Err(ProxyError::NotPreventable(_)))
    ));
}
