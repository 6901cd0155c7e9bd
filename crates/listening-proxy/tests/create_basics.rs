mod common;

use std::str::FromStr;

use common::{fixture, new_log, no_listeners, path, record};
use listening_proxy::{
    create, is_listening_proxy, EventType, ListenerSpec, ProxyError, Value,
    EVENT_TYPE_AFTER_CHANGE, EVENT_TYPE_BEFORE_CHANGE, EVENT_TYPE_GET_PROPERTY,
};
use serde_json::json;

#[test]
fn create_rejects_non_object_targets() {
    for value in [
        Value::Undefined,
        Value::Null,
        Value::Bool(true),
        Value::from(3),
        Value::from("text"),
    ] {
        let err = create(value, no_listeners()).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidTarget), "{err:?}");
    }
}

#[test]
fn create_rejects_unknown_event_types() {
    let err = create(
        fixture(json!({})),
        [ListenerSpec::new("onChange", |_| Ok(()))],
    )
    .unwrap_err();
    assert!(matches!(err, ProxyError::UnknownEventType(ref name) if name == "onChange"));
    assert_eq!(err.to_string(), "event type 'onChange' unknown");
}

#[test]
fn wrapping_twice_returns_the_same_wrapper_and_merges_listeners() {
    let value = fixture(json!({"a": 1}));
    let first = create(value.clone(), no_listeners()).unwrap();

    let log = new_log();
    let second = create(value.clone(), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    assert_eq!(first, second);
    assert!(first.ptr_eq(&second));

    first.set("a", 2).unwrap();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(first.listener_state().borrow().listener_count(EventType::AfterChange), 1);

    let third = create(Value::from(&second), no_listeners()).unwrap();
    assert_eq!(third, first);
}

#[test]
fn nested_objects_are_wrapped_eagerly() {
    let value = fixture(json!({"a": {"b": {"c": [1, {"d": true}]}}, "n": 1}));
    let root = create(value.clone(), no_listeners()).unwrap();
    assert!(is_listening_proxy(&value));

    let a = value.as_object().unwrap().get("a");
    assert!(is_listening_proxy(&a));
    let c = root.child("a").unwrap().child("b").unwrap().child("c").unwrap();
    assert!(is_listening_proxy(&c.get(1usize).unwrap()));
    assert!(!is_listening_proxy(&root.get("n").unwrap()));

    let parents = c.parents();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].1, path(&["c"]));
}

#[test]
fn protected_keys_cannot_be_written_or_deleted() {
    let log = new_log();
    let root = create(
        fixture(json!({"a": 1})),
        [
            record(EVENT_TYPE_BEFORE_CHANGE, &log),
            record(EVENT_TYPE_AFTER_CHANGE, &log),
        ],
    )
    .unwrap();

    for key in ["addListener", "removeListener", "@@isProxy", "@@proxyTarget", "@@proxyListeners"] {
        match root.set(key, 1) {
            Err(ProxyError::ProtectedProperty { property, operation }) => {
                assert_eq!(property, key);
                assert_eq!(operation, "set");
            }
            other => panic!("unexpected {other:?}"),
        }
        match root.delete(key) {
            Err(ProxyError::ProtectedProperty { operation, .. }) => assert_eq!(operation, "deleted"),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(log.borrow().is_empty());
    assert!(matches!(
        root.call("addListener", &[]),
        Err(ProxyError::NotAFunction(_))
    ));
}

#[test]
fn capability_reads_do_not_fire_get_property() {
    let log = new_log();
    let value = fixture(json!({"a": 1}));
    let root = create(value.clone(), [record(EVENT_TYPE_GET_PROPERTY, &log)]).unwrap();

    assert_eq!(root.get("@@isProxy").unwrap(), Value::Bool(true));
    let target = root.get("@@proxyTarget").unwrap();
    assert!(target.as_object().unwrap().ptr_eq(value.as_object().unwrap()));
    assert!(log.borrow().is_empty());

    assert_eq!(root.get("a").unwrap(), Value::from(1));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn event_type_identifiers_parse() {
    for event_type in EventType::ALL {
        assert_eq!(EventType::from_str(event_type.as_str()).unwrap(), event_type);
    }
    assert_eq!(EventType::from_str("beforeChange").unwrap(), EventType::BeforeChange);
    assert!(EventType::from_str("BeforeChange").is_err());
}

#[test]
fn innermost_write_reports_path_from_listener_to_change() {
    let log = new_log();
    let root = create(
        fixture(json!({"foo": {"bar": {"baz": {"qux": true}}}})),
        [record(EVENT_TYPE_AFTER_CHANGE, &log)],
    )
    .unwrap();

    let baz = root.child("foo").unwrap().child("bar").unwrap().child("baz").unwrap();
    baz.set("qux", false).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    let event = &log[0];
    assert_eq!(event.event_type, EventType::AfterChange);
    assert_eq!(event.action.as_deref(), Some("set"));
    assert_eq!(event.property, Some("qux".into()));
    assert_eq!(event.value, Some(Value::Bool(false)));
    assert_eq!(event.was_value, Some(Value::Bool(true)));
    assert_eq!(event.path, path(&["foo", "bar", "baz"]));
}

#[test]
fn snapshots_serialize_with_camel_case_fields() {
    let log = new_log();
    let root = create(fixture(json!({"a": true})), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();
    root.set("a", false).unwrap();

    let json = serde_json::to_value(&log.borrow()[0]).unwrap();
    assert_eq!(json["type"], json!("afterChange"));
    assert_eq!(json["action"], json!("set"));
    assert_eq!(json["property"], json!("a"));
    assert_eq!(json["wasValue"], json!(true));
    assert_eq!(json["value"], json!(false));
    assert_eq!(json["path"], json!([]));
    assert!(json.get("result").is_none());
}
