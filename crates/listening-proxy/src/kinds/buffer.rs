//! Numeric buffer override table. Elements are numbers, so mutators never
//! touch the parent table.

use crate::buffer::NumericBuffer;
use crate::error::ProxyError;
use crate::events::Change;
use crate::object::{Container, Object};
use crate::proxy::ListeningProxy;
use crate::sequence::{self, relative_index, sort_values, to_integer};
use crate::value::Value;

use super::{action, arg, sequence_query, wrong_kind, Method};

pub(super) fn method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "copyWithin" | "fill" | "reverse" | "set" | "sort" => mutate,
        _ if sequence::query(name, true).is_some() => sequence_query,
        _ => return None,
    };
    Some(method)
}

fn snapshot(target: &Object) -> Option<NumericBuffer> {
    match &*target.borrow() {
        Container::Buffer(buffer) => Some(buffer.clone()),
        _ => None,
    }
}

fn mutate(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let was = snapshot(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let change = Change::new(action(name))
        .was_value(Value::Object(Object::buffer(was)))
        .arguments(args.to_vec());

    let op = name.to_string();
    let op_args = args.to_vec();
    let op_target = target.clone();
    let outcome = proxy.fire_before_change(change.clone(), move || {
        let Some(mut current) = snapshot(&op_target) else {
            return Ok(Value::Undefined);
        };
        apply(&op, &mut current, &op_args)?;
        if let Container::Buffer(slot) = &mut *op_target.borrow_mut() {
            *slot = current;
        }
        Ok(Value::Undefined)
    })?;

    if !outcome.prevented {
        if let Some(now) = snapshot(&target) {
            proxy.fire_after_change(change.value(Value::Object(Object::buffer(now))))?;
        }
    }
    Ok(Value::from(proxy))
}

fn numbers_of(source: &Value) -> Result<Vec<f64>, ProxyError> {
    let Value::Object(object) = source else {
        return Err(ProxyError::invalid_argument("set", "source must be an array or buffer"));
    };
    match &*object.borrow() {
        Container::Array(items) => Ok(items.iter().map(Value::to_number).collect()),
        Container::Buffer(buffer) => Ok(buffer.iter().collect()),
        _ => Err(ProxyError::invalid_argument("set", "source must be an array or buffer")),
    }
}

fn apply(name: &str, buffer: &mut NumericBuffer, args: &[Value]) -> Result<(), ProxyError> {
    let len = buffer.len();
    match name {
        "copyWithin" => {
            let to = relative_index(args.first(), len, 0);
            let start = relative_index(args.get(1), len, 0);
            let end = relative_index(args.get(2), len, len);
            buffer.copy_within(to, start, end);
        }
        "fill" => {
            let start = relative_index(args.get(1), len, 0);
            let end = relative_index(args.get(2), len, len);
            buffer.fill(arg(args, 0).to_number(), start, end);
        }
        "reverse" => buffer.reverse(),
        "set" => {
            let values = numbers_of(&arg(args, 0))?;
            let offset = args.get(1).map_or(0.0, to_integer);
            if offset < 0.0 {
                return Err(ProxyError::invalid_argument("set", "offset is out of bounds"));
            }
            buffer
                .set_from(&values, offset as usize)
                .map_err(|reason| ProxyError::invalid_argument("set", reason))?;
        }
        "sort" => match args.first() {
            None | Some(Value::Undefined) => buffer.sort(),
            Some(Value::Function(comparator)) => {
                let items = buffer.iter().map(Value::Number).collect();
                let sorted = sort_values(items, Some(comparator))?;
                *buffer = NumericBuffer::from_values(
                    buffer.kind(),
                    sorted.iter().map(Value::to_number),
                );
            }
            Some(_) => {
                return Err(ProxyError::invalid_argument(
                    "sort",
                    "comparator must be a function",
                ))
            }
        },
        other => return Err(ProxyError::unsupported(other, "typed array")),
    }
    Ok(())
}
