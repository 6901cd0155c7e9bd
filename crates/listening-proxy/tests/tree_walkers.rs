mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{fixture, new_log, no_listeners, path, paths, record};
use listening_proxy::{
    create, tree_walk, Container, ContainerKind, ListenerSpec, Object, PathStep, ProxyError, Value,
    EVENT_TYPE_AFTER_CHANGE, EVENT_TYPE_GET_TREEWALKER,
};
use serde_json::json;

/// Links only the map entries whose key starts with `keep`.
fn selective_map_walker() -> ListenerSpec {
    ListenerSpec::get_treewalker(|event| {
        if event.proxy().kind() != ContainerKind::Map {
            return Ok(());
        }
        event.use_tree_walker_fn(|map| {
            let entries: Vec<(Value, Value)> = match &*map.target().borrow() {
                Container::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => Vec::new(),
            };
            for (key, value) in entries {
                let keep = key.as_str().is_some_and(|k| k.starts_with("keep"));
                if keep && value.is_object() {
                    let child = create(value, no_listeners())?;
                    child.add_parent(map, PathStep::MapKey(key));
                }
            }
            Ok(())
        })?;
        Ok(())
    })
}

#[test]
fn custom_walkers_replace_the_default_walk() {
    let log = new_log();
    let skipped = fixture(json!({"n": 0}));
    let root = create(
        Object::map([
            (Value::from("keep-a"), fixture(json!({"n": 1}))),
            (Value::from("skip"), skipped.clone()),
        ]),
        [selective_map_walker(), record(EVENT_TYPE_AFTER_CHANGE, &log)],
    )
    .unwrap();

    assert!(!skipped.is_listening_proxy());
    let kept = root.map_get("keep-a").unwrap().as_proxy().unwrap();
    kept.set("n", 2).unwrap();
    assert_eq!(
        paths(&log),
        vec![vec![PathStep::MapKey(Value::from("keep-a"))]]
    );

    assert!(kept.remove_parent(&root, PathStep::MapKey(Value::from("keep-a"))));
    assert!(kept.parents().is_empty());
    kept.set("n", 3).unwrap();
    assert_eq!(paths(&log).len(), 1);
}

#[test]
fn get_treewalker_events_bubble_from_new_children() {
    let log = new_log();
    let root = create(fixture(json!({"a": {}})), [record(EVENT_TYPE_GET_TREEWALKER, &log)]).unwrap();
    assert_eq!(paths(&log), vec![vec![], path(&["a"])]);

    root.set("b", fixture(json!({"c": {}}))).unwrap();
    assert_eq!(
        paths(&log),
        vec![vec![], path(&["a"]), path(&["b"]), path(&["b", "c"])]
    );
}

#[test]
fn tree_walker_overrides_must_be_functions() {
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let sink = outcomes.clone();
    create(
        fixture(json!({})),
        [ListenerSpec::get_treewalker(move |event| {
            sink.borrow_mut().push(event.use_tree_walker(Value::from(1)));
            sink.borrow_mut().push(event.prevent_default());
            Ok(())
        })],
    )
    .unwrap();

    let outcomes = outcomes.borrow();
    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes.iter() {
        assert!(matches!(outcome, Err(ProxyError::InvalidTreewalkerOverride)));
    }
}

#[test]
fn tree_walk_links_values_added_behind_the_wrappers_back() {
    let log = new_log();
    let value = fixture(json!({}));
    let root = create(value.clone(), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    let raw = fixture(json!({"n": 1}));
    root.target().insert_raw("late", raw.clone());
    assert!(!raw.is_listening_proxy());

    tree_walk(&value).unwrap();
    raw.as_proxy().unwrap().set("n", 2).unwrap();
    assert_eq!(paths(&log), vec![path(&["late"])]);

    assert!(matches!(
        tree_walk(&fixture(json!({}))),
        Err(ProxyError::NotAProxy(_))
    ));
}

#[test]
fn cyclic_graphs_terminate() {
    let log = new_log();
    let a = Object::plain([("name", Value::from("a"))]);
    let b = Object::plain([("a", Value::Object(a.clone()))]);
    a.insert_raw("b", Value::Object(b.clone()));
    a.insert_raw("me", Value::Object(a.clone()));

    let root = create(a.clone(), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    assert!(Value::Object(b.clone()).is_listening_proxy());

    root.child("b").unwrap().set("x", 1).unwrap();
    assert_eq!(paths(&log), vec![path(&["b"])]);

    root.set("name", "z").unwrap();
    assert_eq!(paths(&log).len(), 2);
    assert_eq!(
        Value::Object(a).to_json(),
        json!({"name": "z", "b": {"a": "[Circular]", "x": 1}, "me": "[Circular]"})
    );
}
