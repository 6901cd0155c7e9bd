//! Dynamic values held by instrumented object graphs.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::error::ListenerError;
use crate::object::{Container, Object};
use crate::proxy::ListeningProxy;

/// A value stored in, read from, or written to an object graph.
///
/// Equality and hashing follow SameValueZero: primitives compare by value
/// (`NaN` equals `NaN`, `+0` equals `-0`) while functions and objects compare
/// by identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Function),
    Object(Object),
}

type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, ListenerError>;

/// A reference-counted callable `(this, args) -> result`.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, ListenerError> + 'static,
    {
        Function(Rc::new(f))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, ListenerError> {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:#x})", self.addr())
    }
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The wrapper of an already-instrumented object value.
    pub fn as_proxy(&self) -> Option<ListeningProxy> {
        self.as_object().and_then(ListeningProxy::existing)
    }

    pub fn is_listening_proxy(&self) -> bool {
        self.as_object().is_some_and(Object::is_wrapped)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Function(_) | Value::Object(_) => true,
        }
    }

    /// Numeric conversion used by index and numeric-buffer arguments.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Function(_) => f64::NAN,
            Value::Object(object) => match &*object.borrow() {
                Container::Date(date) => date.time(),
                _ => f64::NAN,
            },
        }
    }

    /// String conversion used by `join`, default sorting and key coercion.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Function(_) => "function".to_string(),
            Value::Object(object) => object.to_display_string(),
        }
    }

    /// Builds a fresh (unwrapped) graph from JSON.
    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => {
                Value::Object(Object::array(items.iter().map(Value::from_json)))
            }
            JsonValue::Object(map) => Value::Object(Object::plain(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Plain JSON rendering. Cycles render as `"[Circular]"`.
    pub fn to_json(&self) -> JsonValue {
        let mut visiting = HashSet::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut HashSet<usize>) -> JsonValue {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Object(object) => {
                let addr = object.addr();
                if !visiting.insert(addr) {
                    return JsonValue::String("[Circular]".to_string());
                }
                let json = match &*object.borrow() {
                    Container::Object(props) => {
                        let mut map = JsonMap::new();
                        for (key, value) in props {
                            map.insert(key.clone(), value.to_json_inner(visiting));
                        }
                        JsonValue::Object(map)
                    }
                    Container::Array(items) => JsonValue::Array(
                        items.iter().map(|v| v.to_json_inner(visiting)).collect(),
                    ),
                    Container::Map(entries) => JsonValue::Array(
                        entries
                            .iter()
                            .map(|(k, v)| {
                                JsonValue::Array(vec![
                                    k.to_json_inner(visiting),
                                    v.to_json_inner(visiting),
                                ])
                            })
                            .collect(),
                    ),
                    Container::Set(items) => JsonValue::Array(
                        items.iter().map(|v| v.to_json_inner(visiting)).collect(),
                    ),
                    Container::Date(date) => match date.to_iso_string() {
                        Some(iso) => JsonValue::String(iso),
                        None => JsonValue::Null,
                    },
                    Container::Buffer(buffer) => JsonValue::Array(
                        buffer.iter().map(number_to_json).collect(),
                    ),
                };
                visiting.remove(&addr);
                json
            }
        }
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        JsonValue::Number(JsonNumber::from(n as i64))
    } else {
        JsonNumber::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => canonical_bits(*n).hash(state),
            Value::String(s) => s.hash(state),
            Value::Function(f) => f.addr().hash(state),
            Value::Object(o) => o.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Function(func) => fmt::Debug::fmt(func, f),
            Value::Object(object) => fmt::Debug::fmt(object, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Object(object.clone())
    }
}

impl From<ListeningProxy> for Value {
    fn from(proxy: ListeningProxy) -> Self {
        Value::Object(proxy.target())
    }
}

impl From<&ListeningProxy> for Value {
    fn from(proxy: &ListeningProxy) -> Self {
        Value::Object(proxy.target())
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Function(function)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from_json(&json)
    }
}
