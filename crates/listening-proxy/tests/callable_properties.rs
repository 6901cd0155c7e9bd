mod common;

use common::{actions, new_log, no_listeners, record};
use listening_proxy::{
    create, listener, Function, ListenerError, ListenerSpec, Object, PathStep, ProxyError, Value,
    EVENT_TYPE_AFTER_CHANGE, EVENT_TYPE_BEFORE_CHANGE,
};

/// `{count: 0, increment()}` where `increment` bumps `this.count` directly.
fn counter() -> Object {
    let increment = Function::new(|this, args| {
        let target = this
            .as_object()
            .ok_or_else(|| ListenerError::msg("increment called without a target"))?;
        let step = args.first().map_or(1.0, Value::to_number);
        let next = target.get("count").to_number() + step;
        target.insert_raw("count", Value::Number(next));
        Ok(Value::Number(next))
    });
    Object::plain([
        ("count", Value::from(0)),
        ("increment", Value::Function(increment)),
    ])
}

fn as_action(name: Option<&'static str>) -> ListenerSpec {
    ListenerSpec::get_property(move |event| {
        if event.property() == Some(&PathStep::from("increment")) {
            let current = event.result().cloned().unwrap_or_default();
            event.replace_result_as_action(current, name)?;
        }
        Ok(())
    })
}

#[test]
fn stored_functions_are_called_with_the_target_as_this() {
    let target = counter();
    let expected = target.clone();
    let seen_this = Function::new(move |this, _args| {
        Ok(Value::Bool(this.as_object().is_some_and(|o| o.ptr_eq(&expected))))
    });
    target.insert_raw("whoami", Value::Function(seen_this));
    let log = new_log();
    let root = create(target.clone(), [record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();

    assert_eq!(root.call("increment", &[]).unwrap(), Value::from(1));
    assert_eq!(root.call("whoami", &[]).unwrap(), Value::Bool(true));
    assert_eq!(target.get("count"), Value::from(1));
    assert!(log.borrow().is_empty());

    assert!(matches!(
        root.call("count", &[]),
        Err(ProxyError::NotAFunction(name)) if name == "count"
    ));
}

#[test]
fn substituted_callables_fire_change_events_named_after_the_property() {
    let log = new_log();
    let root = create(
        counter(),
        [
            as_action(None),
            record(EVENT_TYPE_BEFORE_CHANGE, &log),
            record(EVENT_TYPE_AFTER_CHANGE, &log),
        ],
    )
    .unwrap();

    assert_eq!(root.call("increment", &[Value::from(5)]).unwrap(), Value::from(5));
    assert_eq!(actions(&log), vec!["[[increment]]", "[[increment]]"]);
    let log = log.borrow();
    assert_eq!(log[0].arguments, Some(vec![Value::from(5)]));
    assert_eq!(log[0].path, Vec::<PathStep>::new());
}

#[test]
fn substituted_callables_take_an_explicit_action_name() {
    let log = new_log();
    let root = create(counter(), [as_action(Some("bump")), record(EVENT_TYPE_AFTER_CHANGE, &log)]).unwrap();

    let increment = root.get("increment").unwrap();
    let function = increment.as_function().unwrap();
    function.call(&Value::Undefined, &[]).unwrap();
    assert_eq!(actions(&log), vec!["[[bump]]"]);
    assert_eq!(root.target().get("count"), Value::from(1));
}

#[test]
fn preventing_a_substituted_callable_skips_the_call() {
    let target = counter();
    let root = create(target.clone(), [as_action(None)]).unwrap();
    root.add_listener(
        EVENT_TYPE_BEFORE_CHANGE,
        listener(|event| {
            if event.action() == Some("[[increment]]") {
                event.prevent_default()?;
            }
            Ok(())
        }),
    )
    .unwrap();

    assert_eq!(root.call("increment", &[]).unwrap(), Value::Undefined);
    assert_eq!(target.get("count"), Value::from(0));
}

#[test]
fn non_function_replacements_do_not_become_actions() {
    let root = create(
        counter(),
        [ListenerSpec::get_property(|event| {
            event.replace_result_as_action(7, None)?;
            assert!(!event.fires_before_and_after());
            Ok(())
        })],
    )
    .unwrap();
    assert_eq!(root.get("count").unwrap(), Value::from(7));
    assert!(matches!(
        root.call("increment", &[]),
        Err(ProxyError::NotAFunction(_))
    ));
    let unwatched = create(counter(), no_listeners()).unwrap();
    assert_eq!(unwatched.get("count").unwrap(), Value::from(0));
}
