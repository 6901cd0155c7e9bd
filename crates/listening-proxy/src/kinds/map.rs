//! Ordered map override table.
//!
//! Mutators report whole-map snapshots: `wasValue` is a copy of the map before
//! the change and `value` a copy of what it becomes. Object values are linked
//! under their map key.

use indexmap::IndexMap;

use crate::error::ProxyError;
use crate::events::Change;
use crate::object::{Container, Object};
use crate::path::PathStep;
use crate::proxy::ListeningProxy;
use crate::value::Value;

use super::{action, arg, for_each_entry, wrong_kind, Method};

pub(super) fn method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "clear" => clear,
        "delete" => delete,
        "set" => set,
        "entries" | "forEach" | "get" | "has" | "keys" | "values" => query,
        _ => return None,
    };
    Some(method)
}

fn entries(target: &Object) -> Option<IndexMap<Value, Value>> {
    match &*target.borrow() {
        Container::Map(entries) => Some(entries.clone()),
        _ => None,
    }
}

fn snapshot(entries: IndexMap<Value, Value>) -> Value {
    Value::Object(Object::new(Container::Map(entries)))
}

fn clear(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let was = entries(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let change = Change::new(action(name))
        .value(snapshot(IndexMap::new()))
        .was_value(snapshot(was.clone()))
        .arguments(args.to_vec());
    let owner = proxy.clone();
    proxy.change(change, move || {
        for (key, value) in &was {
            if let Value::Object(child) = value {
                owner.detach(child, &PathStep::MapKey(key.clone()));
            }
        }
        if let Container::Map(entries) = &mut *owner.target().borrow_mut() {
            entries.clear();
        }
        Ok(Value::Undefined)
    })?;
    Ok(Value::Undefined)
}

fn delete(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let was = entries(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let key = arg(args, 0);
    let mut now = was.clone();
    now.shift_remove(&key);
    let change = Change::new(action(name))
        .value(snapshot(now))
        .was_value(snapshot(was))
        .arguments(args.to_vec());
    let owner = proxy.clone();
    let outcome = proxy.change(change, move || {
        let removed = match &mut *owner.target().borrow_mut() {
            Container::Map(entries) => entries.shift_remove(&key),
            _ => None,
        };
        if let Some(Value::Object(child)) = &removed {
            owner.detach(child, &PathStep::MapKey(key));
        }
        Ok(Value::Bool(removed.is_some()))
    })?;
    Ok(outcome.result.unwrap_or(Value::Bool(false)))
}

fn set(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let was = entries(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let key = arg(args, 0);
    let value = arg(args, 1);
    let mut now = was.clone();
    now.insert(key.clone(), value.clone());
    let change = Change::new(action(name))
        .value(snapshot(now))
        .was_value(snapshot(was))
        .arguments(args.to_vec());
    let owner = proxy.clone();
    proxy.change(change, move || {
        let step = PathStep::MapKey(key.clone());
        let current = match &*owner.target().borrow() {
            Container::Map(entries) => entries.get(&key).cloned(),
            _ => None,
        };
        if let Some(Value::Object(old)) = &current {
            owner.detach(old, &step);
        }
        if let Value::Object(child) = &value {
            owner.attach(child, step)?;
        }
        if let Container::Map(entries) = &mut *owner.target().borrow_mut() {
            entries.insert(key, value);
        }
        Ok(Value::Undefined)
    })?;
    Ok(Value::from(proxy))
}

fn query(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let entries = entries(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let result = match name {
        "get" => entries.get(&arg(args, 0)).cloned().unwrap_or_default(),
        "has" => Value::Bool(entries.contains_key(&arg(args, 0))),
        "keys" => Value::Object(Object::array(entries.keys().cloned())),
        "values" => Value::Object(Object::array(entries.values().cloned())),
        "entries" => Value::Object(Object::array(entries.into_iter().map(|(k, v)| {
            Value::Object(Object::array([k, v]))
        }))),
        "forEach" => {
            return for_each_entry(args, Value::Object(target), entries.into_iter().collect())
        }
        _ => return Err(wrong_kind(proxy, name)),
    };
    Ok(result)
}
