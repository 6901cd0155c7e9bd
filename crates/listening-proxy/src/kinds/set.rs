//! Unique-value set override table.
//!
//! Set elements are opaque: an added object is neither wrapped nor linked as
//! a child, so membership stays a matter of identity.

use indexmap::IndexSet;

use crate::error::ProxyError;
use crate::events::Change;
use crate::object::{Container, Object};
use crate::proxy::ListeningProxy;
use crate::value::Value;

use super::{action, arg, for_each_entry, wrong_kind, Method};

pub(super) fn method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "add" | "clear" | "delete" => mutate,
        "entries" | "forEach" | "has" | "keys" | "values" => query,
        _ => return None,
    };
    Some(method)
}

fn items(target: &Object) -> Option<IndexSet<Value>> {
    match &*target.borrow() {
        Container::Set(items) => Some(items.clone()),
        _ => None,
    }
}

fn snapshot(items: IndexSet<Value>) -> Value {
    Value::Object(Object::new(Container::Set(items)))
}

fn mutate(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let was = items(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let change = Change::new(action(name))
        .was_value(snapshot(was))
        .arguments(args.to_vec());

    let op = name.to_string();
    let element = arg(args, 0);
    let op_target = target.clone();
    let outcome = proxy.fire_before_change(change.clone(), move || {
        let mut data = op_target.borrow_mut();
        let Container::Set(items) = &mut *data else {
            return Ok(Value::Undefined);
        };
        Ok(match op.as_str() {
            "add" => {
                items.insert(element);
                Value::Undefined
            }
            "delete" => Value::Bool(items.shift_remove(&element)),
            _ => {
                items.clear();
                Value::Undefined
            }
        })
    })?;

    if !outcome.prevented {
        let now = items(&target).unwrap_or_default();
        proxy.fire_after_change(change.value(snapshot(now)))?;
    }
    match name {
        "add" => Ok(Value::from(proxy)),
        _ => Ok(outcome.result.unwrap_or_default()),
    }
}

fn query(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let items = items(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let result = match name {
        "has" => Value::Bool(items.contains(&arg(args, 0))),
        "keys" | "values" => Value::Object(Object::array(items)),
        "entries" => Value::Object(Object::array(
            items
                .into_iter()
                .map(|v| Value::Object(Object::array([v.clone(), v]))),
        )),
        "forEach" => {
            let entries = items.into_iter().map(|v| (v.clone(), v)).collect();
            return for_each_entry(args, Value::Object(target), entries);
        }
        _ => return Err(wrong_kind(proxy, name)),
    };
    Ok(result)
}
