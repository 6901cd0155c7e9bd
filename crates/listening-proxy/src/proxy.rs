//! The wrapper type: identity, listener registration and the read/write/delete
//! interception surface.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ProxyError;
use crate::events::{Change, Event, IntoEventType};
use crate::kinds;
use crate::listeners::{Listener, ListenerSpec, ListenerState};
use crate::object::{Container, ContainerKind, Object};
use crate::path::PathStep;
use crate::propagation;
use crate::tree_walk;
use crate::value::{Function, Value};

pub const ADD_LISTENER: &str = "addListener";
pub const REMOVE_LISTENER: &str = "removeListener";
pub const IS_PROXY: &str = "@@isProxy";
pub const PROXY_TARGET: &str = "@@proxyTarget";
pub const PROXY_LISTENERS: &str = "@@proxyListeners";

const PROTECTED_KEYS: [&str; 5] = [
    ADD_LISTENER,
    REMOVE_LISTENER,
    IS_PROXY,
    PROXY_TARGET,
    PROXY_LISTENERS,
];

fn is_protected(key: &PathStep) -> bool {
    key.as_key().is_some_and(|name| PROTECTED_KEYS.contains(&name))
}

/// What happened to the default action of a before-change event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeOutcome {
    pub prevented: bool,
    pub performed: bool,
    /// Return value of the default action, when it ran.
    pub result: Option<Value>,
}

/// Instrumented façade over one [`Object`].
///
/// There is exactly one wrapper per object: the listener state lives in the
/// object's own cell, so every handle returned for the same object compares
/// equal and shares listeners and parents.
#[derive(Clone)]
pub struct ListeningProxy {
    object: Object,
    state: Rc<RefCell<ListenerState>>,
}

impl ListeningProxy {
    // ── Creation & identity ─────────────────────────────────────────────

    /// Wraps `value`, or returns its existing wrapper with `specs` merged in.
    pub fn create<I>(value: impl Into<Value>, specs: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = ListenerSpec>,
    {
        let resolved = specs
            .into_iter()
            .map(|spec| spec.resolve())
            .collect::<Result<Vec<_>, _>>()?;
        let Value::Object(object) = value.into() else {
            return Err(ProxyError::InvalidTarget);
        };
        let (proxy, fresh) = Self::wrap(&object);
        {
            let mut state = proxy.state.borrow_mut();
            for (event_type, listener) in resolved {
                state.add(event_type, listener);
            }
        }
        if fresh {
            tree_walk::walk(&proxy)?;
        }
        Ok(proxy)
    }

    /// The wrapper of an already-wrapped object.
    pub fn existing(object: &Object) -> Option<Self> {
        object.0.state.get().map(|state| ListeningProxy {
            object: object.clone(),
            state: state.clone(),
        })
    }

    /// Returns the wrapper and whether it was created by this call.
    pub(crate) fn wrap(object: &Object) -> (Self, bool) {
        let mut fresh = false;
        let state = object
            .0
            .state
            .get_or_init(|| {
                fresh = true;
                Rc::new(RefCell::new(ListenerState::new()))
            })
            .clone();
        if fresh {
            tracing::debug!(
                target: "listening_proxy",
                kind = object.kind().name(),
                "wrapped object"
            );
        }
        (
            ListeningProxy {
                object: object.clone(),
                state,
            },
            fresh,
        )
    }

    /// The underlying object. Mutating it directly bypasses listeners.
    pub fn target(&self) -> Object {
        self.object.clone()
    }

    pub fn kind(&self) -> ContainerKind {
        self.object.kind()
    }

    pub fn listener_state(&self) -> Rc<RefCell<ListenerState>> {
        self.state.clone()
    }

    pub(crate) fn state(&self) -> &RefCell<ListenerState> {
        &self.state
    }

    pub fn ptr_eq(&self, other: &ListeningProxy) -> bool {
        self.object.ptr_eq(&other.object)
    }

    // ── Listeners ───────────────────────────────────────────────────────

    pub fn add_listener(
        &self,
        event_type: impl IntoEventType,
        listener: Listener,
    ) -> Result<&Self, ProxyError> {
        let event_type = event_type.into_event_type()?;
        self.state.borrow_mut().add(event_type, listener);
        Ok(self)
    }

    pub fn remove_listener(
        &self,
        event_type: impl IntoEventType,
        listener: &Listener,
    ) -> Result<&Self, ProxyError> {
        let event_type = event_type.into_event_type()?;
        self.state.borrow_mut().remove(event_type, listener);
        Ok(self)
    }

    // ── Parent table ────────────────────────────────────────────────────

    /// Records that `self` is reachable from `parent` under `key`.
    pub fn add_parent(&self, parent: &ListeningProxy, key: impl Into<PathStep>) -> bool {
        self.state.borrow_mut().add_parent(&parent.object, key.into())
    }

    pub fn remove_parent(&self, parent: &ListeningProxy, key: impl Into<PathStep>) -> bool {
        self.state.borrow_mut().remove_parent(&parent.object, &key.into())
    }

    /// Every live parent with the keys `self` is reachable under.
    pub fn parents(&self) -> Vec<(ListeningProxy, Vec<PathStep>)> {
        let parents = self.state.borrow().parents();
        parents
            .into_iter()
            .filter_map(|(parent, keys)| Self::existing(&parent).map(|p| (p, keys)))
            .collect()
    }

    /// Wraps `child` if needed, links it under `key` and walks it when fresh.
    pub(crate) fn attach(&self, child: &Object, key: PathStep) -> Result<ListeningProxy, ProxyError> {
        let (child, fresh) = Self::wrap(child);
        child.state.borrow_mut().add_parent(&self.object, key);
        if fresh {
            tree_walk::walk(&child)?;
        }
        Ok(child)
    }

    pub(crate) fn detach(&self, child: &Object, key: &PathStep) {
        if let Some(child) = Self::existing(child) {
            if child.state.borrow_mut().remove_parent(&self.object, key) {
                tracing::debug!(target: "listening_proxy", key = %key, "detached child");
            }
        }
    }

    // ── Event firing ────────────────────────────────────────────────────

    /// Fires a before-change event and, unless a listener prevents it, runs
    /// `default_action` (once, even if a listener already performed it).
    pub fn fire_before_change<F>(&self, change: Change, default_action: F) -> Result<ChangeOutcome, ProxyError>
    where
        F: FnOnce() -> Result<Value, ProxyError> + 'static,
    {
        let mut event = Event::before_change(self.clone(), change, Box::new(default_action));
        propagation::fire(self, &mut event)?;
        let prevented = event.default_prevented();
        if !prevented {
            event.perform_default()?;
        }
        Ok(ChangeOutcome {
            prevented,
            performed: event.default_performed(),
            result: event.default_result().cloned(),
        })
    }

    pub fn fire_after_change(&self, change: Change) -> Result<(), ProxyError> {
        let mut event = Event::after_change(self.clone(), change);
        propagation::fire(self, &mut event)
    }

    /// Fires `change` as a before/after pair around `default_action`.
    pub(crate) fn change<F>(&self, change: Change, default_action: F) -> Result<ChangeOutcome, ProxyError>
    where
        F: FnOnce() -> Result<Value, ProxyError> + 'static,
    {
        let outcome = self.fire_before_change(change.clone(), default_action)?;
        if !outcome.prevented {
            self.fire_after_change(change)?;
        }
        Ok(outcome)
    }

    // ── Reads ───────────────────────────────────────────────────────────

    fn normalize(&self, key: PathStep) -> PathStep {
        match self.kind() {
            kind if kind.is_indexed() => key.normalized_for_sequence(),
            ContainerKind::PlainObject => match key {
                PathStep::Index(i) => PathStep::Key(i.to_string()),
                PathStep::MapKey(key) => PathStep::Key(key.to_display_string()),
                key => key,
            },
            _ => key,
        }
    }

    fn capability(&self, key: &PathStep) -> Option<Value> {
        match key.as_key()? {
            IS_PROXY => Some(Value::Bool(true)),
            PROXY_TARGET => Some(Value::Object(self.target())),
            ADD_LISTENER | REMOVE_LISTENER | PROXY_LISTENERS => Some(Value::Undefined),
            _ => None,
        }
    }

    fn override_method(&self, key: &PathStep) -> Option<(kinds::Method, String)> {
        let name = key.as_key()?;
        kinds::method(self.kind(), name).map(|method| (method, name.to_string()))
    }

    /// Natural resolution: override-table methods first, then the container.
    fn natural_get(&self, key: &PathStep) -> Value {
        match self.override_method(key) {
            Some((method, name)) => Value::Function(kinds::bound(self, name, method)),
            None => self.object.borrow().get(key),
        }
    }

    /// Reads `key`, firing a get-property event whose listeners may substitute
    /// the result.
    pub fn get(&self, key: impl Into<PathStep>) -> Result<Value, ProxyError> {
        let key = self.normalize(key.into());
        if let Some(capability) = self.capability(&key) {
            return Ok(capability);
        }
        let natural = self.natural_get(&key);
        let event = self.fire_get_property(key, natural)?;
        Ok(self.read_result(&event))
    }

    /// Reads `key` and returns the wrapper of the object found there.
    pub fn child(&self, key: impl Into<PathStep>) -> Result<ListeningProxy, ProxyError> {
        let key = key.into();
        self.get(key.clone())?
            .as_proxy()
            .ok_or_else(|| ProxyError::NotAProxy(format!("value at '{key}'")))
    }

    fn fire_get_property(&self, key: PathStep, natural: Value) -> Result<Event, ProxyError> {
        let mut event = Event::get_property(self.clone(), key, natural);
        propagation::fire(self, &mut event)?;
        Ok(event)
    }

    fn read_result(&self, event: &Event) -> Value {
        let result = event.result().cloned().unwrap_or_default();
        match (&result, event.as_action()) {
            (Value::Function(function), Some(action)) if event.fires_before_and_after() => {
                Value::Function(self.action_function(function.clone(), action.to_string()))
            }
            _ => result,
        }
    }

    /// Wraps `function` so that invoking it fires a before/after change pair
    /// tagged `action`, with the call itself as the default action.
    fn action_function(&self, function: Function, action: String) -> Function {
        let proxy = self.clone();
        Function::new(move |_this, args| {
            let change = Change::new(action.clone()).arguments(args.to_vec());
            let inner = function.clone();
            let this = Value::Object(proxy.target());
            let call_args = args.to_vec();
            let outcome = proxy.change(change, move || Ok(inner.call(&this, &call_args)?))?;
            Ok(outcome.result.unwrap_or_default())
        })
    }

    /// Calls the method `name`.
    ///
    /// Override-table methods of the container kind take priority over
    /// callables stored in the container; the latter are invoked with the
    /// underlying target as `this`. A get-property event fires first and may
    /// substitute the callable.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
        let key = PathStep::from(name);
        if is_protected(&key) {
            return Err(ProxyError::NotAFunction(name.to_string()));
        }
        let method = self.override_method(&key);
        let natural = match &method {
            Some((method, name)) => Value::Function(kinds::bound(self, name.clone(), *method)),
            None => self.object.borrow().get(&key),
        };
        let event = self.fire_get_property(key, natural)?;
        if let Some((method, name)) = &method {
            if !event.default_prevented() {
                return method(self, name.as_str(), args);
            }
        }
        match self.read_result(&event) {
            Value::Function(function) => Ok(function.call(&Value::Object(self.target()), args)?),
            _ => Err(ProxyError::NotAFunction(name.to_string())),
        }
    }

    // ── Writes ──────────────────────────────────────────────────────────

    fn check_writable(&self, key: &PathStep, value: Option<&Value>, operation: &'static str) -> Result<(), ProxyError> {
        let kind = self.kind();
        let allowed = match (kind, key) {
            (ContainerKind::PlainObject, PathStep::Key(_)) => true,
            (ContainerKind::Sequence, PathStep::Index(i)) => {
                if *i > MAX_SEQUENCE_INDEX {
                    return Err(ProxyError::invalid_argument(operation, format!("index {i} out of range")));
                }
                true
            }
            (ContainerKind::Sequence, PathStep::Key(name)) if name == "length" => {
                if let Some(value) = value {
                    array_length(value)?;
                    true
                } else {
                    false
                }
            }
            (ContainerKind::NumericBuffer, PathStep::Index(_)) => operation == "set",
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(ProxyError::unsupported(format!("{operation} '{key}'"), kind.name()))
        }
    }

    /// Writes `key`. The before-change event (action `set`) may cancel the
    /// write; object values are wrapped and linked under `key`.
    pub fn set(&self, key: impl Into<PathStep>, value: impl Into<Value>) -> Result<(), ProxyError> {
        let key = self.normalize(key.into());
        if is_protected(&key) {
            return Err(ProxyError::protected(&key, "set"));
        }
        let value = value.into();
        self.check_writable(&key, Some(&value), "set")?;
        let was_value = self.object.borrow().get(&key);
        let change = Change::new("set")
            .property(key.clone())
            .value(value.clone())
            .was_value(was_value);
        let proxy = self.clone();
        self.change(change, move || proxy.assign(key, value))?;
        Ok(())
    }

    fn assign(&self, key: PathStep, value: Value) -> Result<Value, ProxyError> {
        if key.as_key() == Some("length") {
            return self.assign_length(&value);
        }
        let current = self.object.borrow().get(&key);
        if let Value::Object(old) = &current {
            if !matches!(&value, Value::Object(new) if new.ptr_eq(old)) {
                self.detach(old, &key);
            }
        }
        if let Value::Object(new) = &value {
            self.attach(new, key.clone())?;
        }
        match (&mut *self.object.borrow_mut(), &key) {
            (Container::Object(props), PathStep::Key(name)) => {
                props.insert(name.clone(), value.clone());
            }
            (Container::Array(items), PathStep::Index(i)) => {
                if *i >= items.len() {
                    items.resize(*i + 1, Value::Undefined);
                }
                items[*i] = value.clone();
            }
            (Container::Buffer(buffer), PathStep::Index(i)) => {
                buffer.set(*i, value.to_number());
            }
            (container, key) => {
                return Err(ProxyError::unsupported(format!("set '{key}'"), container.kind().name()))
            }
        }
        Ok(value)
    }

    fn assign_length(&self, value: &Value) -> Result<Value, ProxyError> {
        let len = array_length(value)?;
        let removed: Vec<(usize, Value)> = match &*self.object.borrow() {
            Container::Array(items) => items.iter().cloned().enumerate().skip(len).collect(),
            _ => Vec::new(),
        };
        for (index, item) in removed {
            if let Value::Object(old) = item {
                self.detach(&old, &PathStep::Index(index));
            }
        }
        if let Container::Array(items) = &mut *self.object.borrow_mut() {
            items.resize(len, Value::Undefined);
        }
        Ok(Value::from(len))
    }

    /// Deletes `key` (action `deleteProperty`), detaching the old value.
    /// Deleting a sequence element leaves an `undefined` hole.
    pub fn delete(&self, key: impl Into<PathStep>) -> Result<(), ProxyError> {
        let key = self.normalize(key.into());
        if is_protected(&key) {
            return Err(ProxyError::protected(&key, "deleted"));
        }
        self.check_writable(&key, None, "delete")?;
        let was_value = self.object.borrow().get(&key);
        let change = Change::new("deleteProperty")
            .property(key.clone())
            .was_value(was_value);
        let proxy = self.clone();
        self.change(change, move || proxy.remove(key))?;
        Ok(())
    }

    fn remove(&self, key: PathStep) -> Result<Value, ProxyError> {
        let current = self.object.borrow().get(&key);
        if let Value::Object(old) = &current {
            self.detach(old, &key);
        }
        match (&mut *self.object.borrow_mut(), &key) {
            (Container::Object(props), PathStep::Key(name)) => {
                Ok(Value::Bool(props.shift_remove(name).is_some()))
            }
            (Container::Array(items), PathStep::Index(i)) => {
                if let Some(slot) = items.get_mut(*i) {
                    *slot = Value::Undefined;
                }
                Ok(Value::Bool(true))
            }
            (container, key) => Err(ProxyError::unsupported(
                format!("delete '{key}'"),
                container.kind().name(),
            )),
        }
    }

    // ── Typed helpers over the override tables ──────────────────────────

    pub fn push<I>(&self, items: I) -> Result<Value, ProxyError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.call("push", &items.into_iter().collect::<Vec<_>>())
    }

    pub fn pop(&self) -> Result<Value, ProxyError> {
        self.call("pop", &[])
    }

    pub fn shift(&self) -> Result<Value, ProxyError> {
        self.call("shift", &[])
    }

    pub fn unshift<I>(&self, items: I) -> Result<Value, ProxyError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.call("unshift", &items.into_iter().collect::<Vec<_>>())
    }

    pub fn splice<I>(&self, start: i64, delete_count: usize, items: I) -> Result<Value, ProxyError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut args = vec![Value::from(start), Value::from(delete_count)];
        args.extend(items);
        self.call("splice", &args)
    }

    pub fn reverse(&self) -> Result<Value, ProxyError> {
        self.call("reverse", &[])
    }

    pub fn sort(&self, comparator: Option<Function>) -> Result<Value, ProxyError> {
        let args: Vec<Value> = comparator.into_iter().map(Value::Function).collect();
        self.call("sort", &args)
    }

    pub fn fill(&self, value: impl Into<Value>, start: Option<i64>, end: Option<i64>) -> Result<Value, ProxyError> {
        let args = [
            value.into(),
            start.map_or(Value::Undefined, Value::from),
            end.map_or(Value::Undefined, Value::from),
        ];
        self.call("fill", &args)
    }

    pub fn copy_within(&self, target: i64, start: i64, end: Option<i64>) -> Result<Value, ProxyError> {
        let args = [
            Value::from(target),
            Value::from(start),
            end.map_or(Value::Undefined, Value::from),
        ];
        self.call("copyWithin", &args)
    }

    pub fn map_get(&self, key: impl Into<Value>) -> Result<Value, ProxyError> {
        self.call("get", &[key.into()])
    }

    pub fn map_set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Value, ProxyError> {
        self.call("set", &[key.into(), value.into()])
    }

    pub fn map_delete(&self, key: impl Into<Value>) -> Result<Value, ProxyError> {
        self.call("delete", &[key.into()])
    }

    pub fn has(&self, key: impl Into<Value>) -> Result<Value, ProxyError> {
        self.call("has", &[key.into()])
    }

    pub fn set_add(&self, value: impl Into<Value>) -> Result<Value, ProxyError> {
        self.call("add", &[value.into()])
    }

    pub fn set_delete(&self, value: impl Into<Value>) -> Result<Value, ProxyError> {
        self.call("delete", &[value.into()])
    }

    pub fn clear(&self) -> Result<Value, ProxyError> {
        self.call("clear", &[])
    }
}

/// Largest addressable sequence index; one below the largest length.
const MAX_SEQUENCE_INDEX: usize = u32::MAX as usize - 1;

/// Validates a value written to a sequence's `length`.
fn array_length(value: &Value) -> Result<usize, ProxyError> {
    let n = value.to_number();
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
        Ok(n as usize)
    } else {
        Err(ProxyError::invalid_argument("length", "invalid array length"))
    }
}

impl PartialEq for ListeningProxy {
    fn eq(&self, other: &ListeningProxy) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ListeningProxy {}

impl fmt::Debug for ListeningProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ListeningProxy");
        s.field("target", &self.object);
        if let Ok(state) = self.state.try_borrow() {
            s.field("state", &*state);
        }
        s.finish()
    }
}
