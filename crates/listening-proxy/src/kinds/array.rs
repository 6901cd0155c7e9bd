//! Sequence override table.
//!
//! Structural mutators snapshot the elements as `wasValue`, run (or skip) the
//! operation, then detach every old element from its old index and re-walk the
//! sequence so each object element is linked under its current index. Paths
//! of untouched elements therefore change after `reverse`, `sort` or `splice`.

use crate::error::ProxyError;
use crate::events::Change;
use crate::object::{Container, Object};
use crate::path::PathStep;
use crate::proxy::ListeningProxy;
use crate::sequence::{self, relative_index, sort_values, to_integer};
use crate::tree_walk;
use crate::value::Value;

use super::{action, arg, sequence_query, wrong_kind, Method};

pub(super) fn method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "copyWithin" | "fill" | "pop" | "push" | "reverse" | "shift" | "sort" | "splice"
        | "unshift" => mutate,
        _ if sequence::query(name, false).is_some() => sequence_query,
        _ => return None,
    };
    Some(method)
}

fn items(target: &Object) -> Option<Vec<Value>> {
    match &*target.borrow() {
        Container::Array(items) => Some(items.clone()),
        _ => None,
    }
}

/// Mutators that hand back the sequence itself.
fn returns_self(name: &str) -> bool {
    matches!(name, "copyWithin" | "fill" | "reverse" | "sort")
}

/// Result of a mutator whose default action was prevented before it ran.
fn substitute_result(name: &str, target: &Object) -> Value {
    match name {
        "push" | "unshift" => Value::from(target.len()),
        "splice" => Value::Object(Object::array(Vec::new())),
        _ => Value::Undefined,
    }
}

fn mutate(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let was = items(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let change = Change::new(action(name))
        .was_value(Value::Object(Object::array(was.clone())))
        .arguments(args.to_vec());

    let op = name.to_string();
    let op_args = args.to_vec();
    let op_target = target.clone();
    let outcome = proxy.fire_before_change(change.clone(), move || {
        // The elements are copied out so no borrow is held while a sort
        // comparator runs.
        let mut current = items(&op_target).unwrap_or_default();
        let result = apply(&op, &mut current, &op_args)?;
        if let Container::Array(slot) = &mut *op_target.borrow_mut() {
            *slot = current;
        }
        Ok(result)
    })?;

    if outcome.performed {
        reconcile(proxy, &was)?;
    }
    if !outcome.prevented {
        let now = items(&target).unwrap_or_default();
        proxy.fire_after_change(change.value(Value::Object(Object::array(now))))?;
    }
    if returns_self(name) {
        return Ok(Value::from(proxy));
    }
    Ok(outcome
        .result
        .unwrap_or_else(|| substitute_result(name, &target)))
}

/// Detaches every old element from its old index, then re-links the current
/// elements under their current indices.
fn reconcile(proxy: &ListeningProxy, was: &[Value]) -> Result<(), ProxyError> {
    for (index, item) in was.iter().enumerate() {
        if let Value::Object(child) = item {
            proxy.detach(child, &PathStep::Index(index));
        }
    }
    tree_walk::walk(proxy)
}

fn apply(name: &str, items: &mut Vec<Value>, args: &[Value]) -> Result<Value, ProxyError> {
    let len = items.len();
    match name {
        "push" => {
            items.extend(args.iter().cloned());
            Ok(Value::from(items.len()))
        }
        "pop" => Ok(items.pop().unwrap_or_default()),
        "shift" => Ok(if items.is_empty() {
            Value::Undefined
        } else {
            items.remove(0)
        }),
        "unshift" => {
            items.splice(0..0, args.iter().cloned());
            Ok(Value::from(items.len()))
        }
        "splice" => {
            let start = relative_index(args.first(), len, 0);
            let delete_count = match args.len() {
                0 => 0,
                1 => len - start,
                _ => to_integer(&args[1]).clamp(0.0, (len - start) as f64) as usize,
            };
            let removed: Vec<Value> = items
                .splice(start..start + delete_count, args.iter().skip(2).cloned())
                .collect();
            Ok(Value::Object(Object::array(removed)))
        }
        "reverse" => {
            items.reverse();
            Ok(Value::Undefined)
        }
        "sort" => {
            let comparator = match args.first() {
                None | Some(Value::Undefined) => None,
                Some(Value::Function(function)) => Some(function),
                Some(_) => {
                    return Err(ProxyError::invalid_argument(
                        "sort",
                        "comparator must be a function",
                    ))
                }
            };
            *items = sort_values(std::mem::take(items), comparator)?;
            Ok(Value::Undefined)
        }
        "fill" => {
            let value = arg(args, 0);
            let start = relative_index(args.get(1), len, 0);
            let end = relative_index(args.get(2), len, len);
            for slot in items.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            Ok(Value::Undefined)
        }
        "copyWithin" => {
            let to = relative_index(args.first(), len, 0);
            let start = relative_index(args.get(1), len, 0);
            let end = relative_index(args.get(2), len, len);
            if start < end && to < len {
                let count = (end - start).min(len - to);
                let chunk = items[start..start + count].to_vec();
                items[to..to + count].clone_from_slice(&chunk);
            }
            Ok(Value::Undefined)
        }
        other => Err(ProxyError::unsupported(other, "array")),
    }
}
