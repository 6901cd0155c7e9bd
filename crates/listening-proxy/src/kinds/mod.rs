//! Per-container-kind override tables.
//!
//! Each table maps a method name to a handler. Mutating handlers wrap the
//! underlying operation in a before/after change pair (action `name()`) and
//! reconcile the parent table; query handlers forward to the container.

use crate::error::ProxyError;
use crate::object::ContainerKind;
use crate::proxy::ListeningProxy;
use crate::sequence::{self, SequenceView};
use crate::value::{Function, Value};

mod array;
mod buffer;
mod date;
mod map;
mod set;

/// `handler(wrapper, method name, arguments)`
pub(crate) type Method = fn(&ListeningProxy, &str, &[Value]) -> Result<Value, ProxyError>;

pub(crate) fn method(kind: ContainerKind, name: &str) -> Option<Method> {
    match kind {
        ContainerKind::PlainObject => None,
        ContainerKind::Sequence => array::method(name),
        ContainerKind::NumericBuffer => buffer::method(name),
        ContainerKind::Map => map::method(name),
        ContainerKind::Set => set::method(name),
        ContainerKind::Date => date::method(name),
    }
}

/// A callable bound to `proxy`, as returned by reading a method name.
pub(crate) fn bound(proxy: &ListeningProxy, name: String, method: Method) -> Function {
    let proxy = proxy.clone();
    Function::new(move |_this, args| Ok(method(&proxy, &name, args)?))
}

/// Forwards a non-mutating query to a copy of the sequence's elements.
fn sequence_query(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let numeric = proxy.kind() == ContainerKind::NumericBuffer;
    let query = sequence::query(name, numeric).ok_or_else(|| wrong_kind(proxy, name))?;
    let view = SequenceView::of(&proxy.target()).ok_or_else(|| wrong_kind(proxy, name))?;
    query(&view, args)
}

fn action(name: &str) -> String {
    format!("{name}()")
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn wrong_kind(proxy: &ListeningProxy, name: &str) -> ProxyError {
    ProxyError::unsupported(name, proxy.kind().name())
}

/// Calls `args[0]` as `(value, key, collection)` for every entry, with
/// `args[1]` as `this`.
fn for_each_entry(
    args: &[Value],
    collection: Value,
    entries: Vec<(Value, Value)>,
) -> Result<Value, ProxyError> {
    let function = args
        .first()
        .and_then(Value::as_function)
        .ok_or_else(|| ProxyError::NotAFunction("forEach callback".to_string()))?;
    let this = arg(args, 1);
    for (key, value) in entries {
        function.call(&this, &[value, key, collection.clone()])?;
    }
    Ok(Value::Undefined)
}
