//! listening-proxy: observable object graphs.
//!
//! Wrapping a value with [`create`] instruments it and, eagerly, every
//! object nested inside it. Reads fire `getProperty` events; writes, deletes
//! and the mutating methods of each container kind fire a cancellable
//! `beforeChange` followed by an `afterChange`. Events bubble from the
//! changed node up through every container currently holding it, with the
//! path from the listening wrapper down to the change site.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use listening_proxy::{create, ListenerSpec, PathStep, Value};
//! use serde_json::json;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let root = create(
//!     Value::from(json!({"foo": {"bar": {"baz": {"qux": true}}}})),
//!     [ListenerSpec::after_change(move |event| {
//!         sink.borrow_mut().push(event.path());
//!         Ok(())
//!     })],
//! )
//! .unwrap();
//!
//! let baz = root.child("foo").unwrap().child("bar").unwrap().child("baz").unwrap();
//! baz.set("qux", false).unwrap();
//!
//! assert_eq!(
//!     seen.borrow()[0],
//!     vec![PathStep::from("foo"), PathStep::from("bar"), PathStep::from("baz")]
//! );
//! ```
//!
//! Modules, leaves first:
//! - `value`, `object`, `path`: the dynamic value model,
//! - `events`, `listeners`: event kinds and per-wrapper listener state,
//! - `propagation`: bubbling and the exception-handler path,
//! - `proxy`, `tree_walk`, `kinds`: interception and per-kind overrides.

pub mod buffer;
pub mod date;
pub mod error;
pub mod events;
mod kinds;
pub mod listeners;
pub mod object;
pub mod path;
mod propagation;
pub mod proxy;
mod sequence;
mod tree_walk;
pub mod value;

pub use buffer::{NumericBuffer, NumericKind};
pub use date::{DateField, DateValue, Zone};
pub use error::{ListenerError, ProxyError};
pub use events::{
    Change, Event, EventDetail, EventSnapshot, EventType, IntoEventType,
    EVENT_TYPE_AFTER_CHANGE, EVENT_TYPE_BEFORE_CHANGE, EVENT_TYPE_EXCEPTION_HANDLER,
    EVENT_TYPE_GET_PROPERTY, EVENT_TYPE_GET_TREEWALKER,
};
pub use listeners::{listener, same_listener, Listener, ListenerSpec, ListenerState};
pub use object::{Container, ContainerKind, Object};
pub use path::PathStep;
pub use proxy::{ChangeOutcome, ListeningProxy};
pub use tree_walk::tree_walk;
pub use value::{Function, Value};

/// Wraps `value` and everything nested in it, registering `specs` as initial
/// listeners.
///
/// Fails with [`ProxyError::InvalidTarget`] for non-object values and with
/// [`ProxyError::UnknownEventType`] for a spec naming no known event type.
/// Wrapping an already-wrapped value returns its existing wrapper with the
/// new listeners merged in.
pub fn create<I>(value: impl Into<Value>, specs: I) -> Result<ListeningProxy, ProxyError>
where
    I: IntoIterator<Item = ListenerSpec>,
{
    ListeningProxy::create(value, specs)
}

/// `true` when `value` is an object that has been wrapped.
pub fn is_listening_proxy(value: &Value) -> bool {
    value.is_listening_proxy()
}
