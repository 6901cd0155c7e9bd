//! Non-mutating queries shared by sequences and numeric buffers.
//!
//! Queries run over a copy of the elements taken when the query starts, so
//! callbacks may freely read or mutate the sequence they are iterating.

use std::cmp::Ordering;

use crate::buffer::{NumericBuffer, NumericKind};
use crate::error::ProxyError;
use crate::object::{Container, Object};
use crate::value::{Function, Value};

pub(crate) type Query = fn(&SequenceView, &[Value]) -> Result<Value, ProxyError>;

/// How derived sequences (`filter`, `map`, `slice`, ...) are built.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Rebuild {
    Array,
    Buffer(NumericKind),
}

pub(crate) struct SequenceView {
    target: Object,
    items: Vec<Value>,
    rebuild: Rebuild,
}

impl SequenceView {
    pub(crate) fn of(target: &Object) -> Option<Self> {
        let (items, rebuild) = match &*target.borrow() {
            Container::Array(items) => (items.clone(), Rebuild::Array),
            Container::Buffer(buffer) => (
                buffer.iter().map(Value::Number).collect(),
                Rebuild::Buffer(buffer.kind()),
            ),
            _ => return None,
        };
        Some(SequenceView {
            target: target.clone(),
            items,
            rebuild,
        })
    }

    fn build(&self, items: Vec<Value>) -> Value {
        match self.rebuild {
            Rebuild::Array => Value::Object(Object::array(items)),
            Rebuild::Buffer(kind) => Value::Object(Object::buffer(NumericBuffer::from_values(
                kind,
                items.iter().map(Value::to_number),
            ))),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Query table. `subarray` only exists on numeric buffers.
pub(crate) fn query(name: &str, numeric: bool) -> Option<Query> {
    let query: Query = match name {
        "at" => at,
        "entries" => entries,
        "every" => every,
        "filter" => filter,
        "find" => find,
        "findIndex" => find_index,
        "forEach" => for_each,
        "includes" => includes,
        "indexOf" => index_of,
        "join" => join,
        "keys" => keys,
        "lastIndexOf" => last_index_of,
        "map" => map,
        "reduce" => reduce,
        "reduceRight" => reduce_right,
        "slice" => slice,
        "some" => some,
        "values" => values,
        "toString" | "toLocaleString" => to_string,
        "subarray" if numeric => slice,
        _ => return None,
    };
    Some(query)
}

/// Resolves a relative index argument (negative counts from the end) into
/// `0..=len`.
pub(crate) fn relative_index(arg: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(arg) = arg.filter(|v| !v.is_undefined()) else {
        return default;
    };
    let n = to_integer(arg);
    let len = len as f64;
    if n < 0.0 {
        (len + n).max(0.0) as usize
    } else {
        n.min(len) as usize
    }
}

/// Stable sort of `items` with an optional comparator returning a number;
/// without one, elements order by their string form. `undefined` elements
/// always sort last and are never handed to the comparator.
pub(crate) fn sort_values(items: Vec<Value>, comparator: Option<&Function>) -> Result<Vec<Value>, ProxyError> {
    let (defined, undefined): (Vec<Value>, Vec<Value>) =
        items.into_iter().partition(|v| !v.is_undefined());
    let mut compare = |a: &Value, b: &Value| -> Result<Ordering, ProxyError> {
        match comparator {
            Some(function) => {
                let n = function
                    .call(&Value::Undefined, &[a.clone(), b.clone()])?
                    .to_number();
                Ok(if n < 0.0 {
                    Ordering::Less
                } else if n > 0.0 {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                })
            }
            None => Ok(a.to_display_string().cmp(&b.to_display_string())),
        }
    };
    let mut sorted = merge_sort(defined, &mut compare)?;
    sorted.extend(undefined);
    Ok(sorted)
}

// Comparators may fail or be inconsistent; the merge never panics on either.
fn merge_sort<F>(mut items: Vec<Value>, compare: &mut F) -> Result<Vec<Value>, ProxyError>
where
    F: FnMut(&Value, &Value) -> Result<Ordering, ProxyError>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if compare(&right[j], &left[i])? == Ordering::Less {
            merged.push(right[j].clone());
            j += 1;
        } else {
            merged.push(left[i].clone());
            i += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    Ok(merged)
}

/// `ToIntegerOrInfinity` with `NaN` mapping to zero.
pub(crate) fn to_integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

fn callback<'a>(args: &'a [Value], operation: &str) -> Result<(&'a Function, Value), ProxyError> {
    let function = args
        .first()
        .and_then(Value::as_function)
        .ok_or_else(|| ProxyError::NotAFunction(format!("{operation} callback")))?;
    Ok((function, args.get(1).cloned().unwrap_or_default()))
}

/// Calls `callback(element, index, sequence)` for each element until `visit`
/// returns `false`.
fn each<F>(view: &SequenceView, args: &[Value], operation: &str, mut visit: F) -> Result<(), ProxyError>
where
    F: FnMut(usize, &Value, Value) -> bool,
{
    let (function, this) = callback(args, operation)?;
    let sequence = Value::Object(view.target.clone());
    for (index, item) in view.items.iter().enumerate() {
        let result = function.call(&this, &[item.clone(), Value::from(index), sequence.clone()])?;
        if !visit(index, item, result) {
            break;
        }
    }
    Ok(())
}

fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => a == b,
    }
}

fn at(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let n = args.first().map_or(0.0, to_integer);
    let index = if n < 0.0 { view.len() as f64 + n } else { n };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(view.items.get(index as usize).cloned().unwrap_or_default())
}

fn entries(view: &SequenceView, _args: &[Value]) -> Result<Value, ProxyError> {
    Ok(Value::Object(Object::array(view.items.iter().enumerate().map(
        |(i, v)| Value::Object(Object::array([Value::from(i), v.clone()])),
    ))))
}

fn keys(view: &SequenceView, _args: &[Value]) -> Result<Value, ProxyError> {
    Ok(Value::Object(Object::array((0..view.len()).map(Value::from))))
}

fn values(view: &SequenceView, _args: &[Value]) -> Result<Value, ProxyError> {
    Ok(Value::Object(Object::array(view.items.clone())))
}

fn every(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let mut all = true;
    each(view, args, "every", |_, _, result| {
        all = result.is_truthy();
        all
    })?;
    Ok(Value::Bool(all))
}

fn some(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let mut any = false;
    each(view, args, "some", |_, _, result| {
        any = result.is_truthy();
        !any
    })?;
    Ok(Value::Bool(any))
}

fn filter(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let mut kept = Vec::new();
    each(view, args, "filter", |_, item, result| {
        if result.is_truthy() {
            kept.push(item.clone());
        }
        true
    })?;
    Ok(view.build(kept))
}

fn find(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let mut found = Value::Undefined;
    each(view, args, "find", |_, item, result| {
        if result.is_truthy() {
            found = item.clone();
            return false;
        }
        true
    })?;
    Ok(found)
}

fn find_index(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let mut found = Value::from(-1);
    each(view, args, "findIndex", |index, _, result| {
        if result.is_truthy() {
            found = Value::from(index);
            return false;
        }
        true
    })?;
    Ok(found)
}

fn for_each(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    each(view, args, "forEach", |_, _, _| true)?;
    Ok(Value::Undefined)
}

fn map(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let mut mapped = Vec::with_capacity(view.len());
    each(view, args, "map", |_, _, result| {
        mapped.push(result);
        true
    })?;
    Ok(view.build(mapped))
}

fn reduce(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    fold(view, args, "reduce", false)
}

fn reduce_right(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    fold(view, args, "reduceRight", true)
}

fn fold(view: &SequenceView, args: &[Value], name: &str, from_end: bool) -> Result<Value, ProxyError> {
    let (function, _) = callback(args, name)?;
    let mut indexed: Vec<(usize, Value)> = view.items.iter().cloned().enumerate().collect();
    if from_end {
        indexed.reverse();
    }
    let mut items = indexed.into_iter();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match items.next() {
            Some((_, first)) => first,
            None => {
                return Err(ProxyError::invalid_argument(
                    name,
                    format!("{name} of empty sequence with no initial value"),
                ))
            }
        },
    };
    let sequence = Value::Object(view.target.clone());
    for (index, item) in items {
        accumulator = function.call(
            &Value::Undefined,
            &[accumulator, item, Value::from(index), sequence.clone()],
        )?;
    }
    Ok(accumulator)
}

fn includes(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let needle = args.first().cloned().unwrap_or_default();
    let from = relative_index(args.get(1), view.len(), 0);
    Ok(Value::Bool(view.items[from..].iter().any(|v| *v == needle)))
}

fn index_of(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let needle = args.first().cloned().unwrap_or_default();
    let from = relative_index(args.get(1), view.len(), 0);
    let found = view.items[from..]
        .iter()
        .position(|v| strict_equals(v, &needle))
        .map(|i| i + from);
    Ok(found.map_or(Value::from(-1), Value::from))
}

fn last_index_of(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let needle = args.first().cloned().unwrap_or_default();
    if view.items.is_empty() {
        return Ok(Value::from(-1));
    }
    let last = view.len() - 1;
    let from = match args.get(1) {
        None => last,
        Some(arg) => {
            let n = to_integer(arg);
            let n = if n < 0.0 { view.len() as f64 + n } else { n.min(last as f64) };
            if n < 0.0 {
                return Ok(Value::from(-1));
            }
            n as usize
        }
    };
    let found = view.items[..=from]
        .iter()
        .rposition(|v| strict_equals(v, &needle));
    Ok(found.map_or(Value::from(-1), Value::from))
}

pub(crate) fn join_items(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_display_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn join(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(separator) => separator.to_display_string(),
    };
    Ok(Value::String(join_items(&view.items, &separator)))
}

fn to_string(view: &SequenceView, _args: &[Value]) -> Result<Value, ProxyError> {
    Ok(Value::String(join_items(&view.items, ",")))
}

fn slice(view: &SequenceView, args: &[Value]) -> Result<Value, ProxyError> {
    let len = view.len();
    let start = relative_index(args.first(), len, 0);
    let end = relative_index(args.get(1), len, len);
    let items = if start < end {
        view.items[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(view.build(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_indices_clamp() {
        let five = Some(Value::from(5));
        assert_eq!(relative_index(five.as_ref(), 3, 0), 3);
        assert_eq!(relative_index(Some(&Value::from(-1)), 3, 0), 2);
        assert_eq!(relative_index(Some(&Value::from(-10)), 3, 0), 0);
        assert_eq!(relative_index(Some(&Value::Undefined), 3, 7), 7);
        assert_eq!(relative_index(None, 3, 1), 1);
        assert_eq!(relative_index(Some(&Value::from(1.7)), 3, 0), 1);
    }

    #[test]
    fn index_of_uses_strict_equality_while_includes_does_not() {
        let target = Object::array([Value::from(f64::NAN), Value::from(1)]);
        let view = SequenceView::of(&target).unwrap();
        let nan = [Value::from(f64::NAN)];
        assert_eq!(includes(&view, &nan).unwrap(), Value::Bool(true));
        assert_eq!(index_of(&view, &nan).unwrap(), Value::from(-1));
        assert_eq!(last_index_of(&view, &[Value::from(1)]).unwrap(), Value::from(1));
    }

    #[test]
    fn default_sort_compares_strings_and_keeps_undefined_last() {
        let items = vec![Value::from(10), Value::Undefined, Value::from(9), Value::from(1)];
        let sorted = sort_values(items, None).unwrap();
        assert_eq!(
            sorted,
            vec![Value::from(1), Value::from(10), Value::from(9), Value::Undefined]
        );
    }

    #[test]
    fn comparator_errors_abort_the_sort() {
        let failing = Function::new(|_, _| Err(crate::error::ListenerError::msg("nope")));
        let items = vec![Value::from(2), Value::from(1)];
        assert!(matches!(
            sort_values(items, Some(&failing)),
            Err(ProxyError::Listener(_))
        ));
    }

    #[test]
    fn join_skips_nullish() {
        let items = [Value::from(1), Value::Null, Value::Undefined, Value::from("x")];
        assert_eq!(join_items(&items, "-"), "1---x");
    }
}
