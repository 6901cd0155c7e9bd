//! Listener registry and parent table.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;

use crate::error::{ListenerError, ProxyError};
use crate::events::{Event, EventType, IntoEventType};
use crate::object::{Object, ObjectCell};
use crate::path::PathStep;

/// A registered listener. Identity (for removal and de-duplication) is the
/// `Rc` allocation, so keep a clone of the handle you registered.
pub type Listener = Rc<dyn Fn(&mut Event) -> Result<(), ListenerError>>;

/// Boxes a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
{
    Rc::new(f)
}

/// Whether `a` and `b` are the same registration.
pub fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// An initial listener passed to [`create`](crate::create).
#[derive(Clone)]
pub struct ListenerSpec {
    pub event_type: String,
    pub listener: Listener,
}

impl ListenerSpec {
    pub fn new<F>(event_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
    {
        Self::from_listener(event_type, listener(f))
    }

    pub fn from_listener(event_type: impl Into<String>, listener: Listener) -> Self {
        ListenerSpec {
            event_type: event_type.into(),
            listener,
        }
    }

    pub fn before_change<F>(f: F) -> Self
    where
        F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
    {
        Self::new(EventType::BeforeChange.as_str(), f)
    }

    pub fn after_change<F>(f: F) -> Self
    where
        F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
    {
        Self::new(EventType::AfterChange.as_str(), f)
    }

    pub fn get_property<F>(f: F) -> Self
    where
        F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
    {
        Self::new(EventType::GetProperty.as_str(), f)
    }

    pub fn get_treewalker<F>(f: F) -> Self
    where
        F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
    {
        Self::new(EventType::GetTreewalker.as_str(), f)
    }

    pub fn exception_handler<F>(f: F) -> Self
    where
        F: Fn(&mut Event) -> Result<(), ListenerError> + 'static,
    {
        Self::new(EventType::ExceptionHandler.as_str(), f)
    }

    pub(crate) fn resolve(&self) -> Result<(EventType, Listener), ProxyError> {
        Ok((
            self.event_type.as_str().into_event_type()?,
            self.listener.clone(),
        ))
    }
}

impl fmt::Debug for ListenerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSpec")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

struct ParentLink {
    parent: Weak<ObjectCell>,
    keys: IndexSet<PathStep>,
}

/// Per-wrapper listener sets and the table of parents the wrapper is reachable
/// from.
///
/// Parent links are weak: a parent owns its children through its container,
/// never the other way around.
#[derive(Default)]
pub struct ListenerState {
    listeners: [Vec<Listener>; 5],
    parents: Vec<ParentLink>,
}

impl ListenerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` unless it is already registered for `event_type`.
    pub fn add(&mut self, event_type: EventType, listener: Listener) -> bool {
        let set = &mut self.listeners[event_type.index()];
        if set.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        set.push(listener);
        true
    }

    pub fn remove(&mut self, event_type: EventType, listener: &Listener) -> bool {
        let set = &mut self.listeners[event_type.index()];
        let before = set.len();
        set.retain(|l| !same_listener(l, listener));
        set.len() != before
    }

    /// Copy of the current listener list, safe to iterate while listeners
    /// register or remove others.
    pub fn listeners(&self, event_type: EventType) -> Vec<Listener> {
        self.listeners[event_type.index()].clone()
    }

    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.listeners[event_type.index()].len()
    }

    pub(crate) fn add_parent(&mut self, parent: &Object, key: PathStep) -> bool {
        self.prune();
        match self.link_mut(parent) {
            Some(link) => link.keys.insert(key),
            None => {
                self.parents.push(ParentLink {
                    parent: parent.downgrade(),
                    keys: IndexSet::from([key]),
                });
                true
            }
        }
    }

    pub(crate) fn remove_parent(&mut self, parent: &Object, key: &PathStep) -> bool {
        let Some(link) = self.link_mut(parent) else {
            return false;
        };
        let removed = link.keys.shift_remove(key);
        if link.keys.is_empty() {
            let parent = parent.downgrade();
            self.parents.retain(|l| !l.parent.ptr_eq(&parent));
        }
        removed
    }

    /// Live parents with every key each one reaches this value under.
    pub(crate) fn parents(&self) -> Vec<(Object, Vec<PathStep>)> {
        self.parents
            .iter()
            .filter_map(|link| {
                link.parent
                    .upgrade()
                    .map(|cell| (Object(cell), link.keys.iter().cloned().collect()))
            })
            .collect()
    }

    fn link_mut(&mut self, parent: &Object) -> Option<&mut ParentLink> {
        let parent = parent.downgrade();
        self.parents.iter_mut().find(|l| l.parent.ptr_eq(&parent))
    }

    fn prune(&mut self) {
        self.parents.retain(|l| l.parent.strong_count() > 0);
    }
}

impl fmt::Debug for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ListenerState");
        for event_type in EventType::ALL {
            s.field(event_type.as_str(), &self.listener_count(event_type));
        }
        s.field("parents", &self.parents.len()).finish()
    }
}
