#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use listening_proxy::{listener, EventSnapshot, Listener, ListenerSpec, PathStep, Value};
use serde_json::Value as JsonValue;

pub type Log = Rc<RefCell<Vec<EventSnapshot>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// A listener that appends a snapshot of every event it sees to `log`.
pub fn recorder(log: &Log) -> Listener {
    let log = log.clone();
    listener(move |event| {
        log.borrow_mut().push(event.snapshot());
        Ok(())
    })
}

pub fn record(event_type: &str, log: &Log) -> ListenerSpec {
    ListenerSpec::from_listener(event_type, recorder(log))
}

pub fn fixture(json: JsonValue) -> Value {
    Value::from(json)
}

pub fn path(steps: &[&str]) -> Vec<PathStep> {
    steps.iter().map(|s| PathStep::from(*s)).collect()
}

pub fn actions(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter_map(|snapshot| snapshot.action.clone())
        .collect()
}

pub fn paths(log: &Log) -> Vec<Vec<PathStep>> {
    log.borrow().iter().map(|snapshot| snapshot.path.clone()).collect()
}

pub fn json_of(value: &Option<Value>) -> JsonValue {
    value.as_ref().map_or(JsonValue::Null, Value::to_json)
}

pub fn no_listeners() -> Vec<ListenerSpec> {
    Vec::new()
}
