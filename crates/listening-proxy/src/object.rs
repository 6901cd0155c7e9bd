//! Shared, mutable containers and their kinds.

use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use crate::buffer::NumericBuffer;
use crate::date::DateValue;
use crate::listeners::ListenerState;
use crate::path::PathStep;
use crate::value::Value;

/// The underlying data of an [`Object`].
#[derive(Debug, Clone)]
pub enum Container {
    /// Plain record: insertion-ordered string-keyed properties.
    Object(IndexMap<String, Value>),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Insertion-ordered key/value map.
    Map(IndexMap<Value, Value>),
    /// Insertion-ordered unique-value set.
    Set(IndexSet<Value>),
    Date(DateValue),
    Buffer(NumericBuffer),
}

/// Closed set of container kinds; selects the override table of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    PlainObject,
    Sequence,
    Map,
    Set,
    Date,
    NumericBuffer,
}

impl ContainerKind {
    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::PlainObject => "object",
            ContainerKind::Sequence => "array",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
            ContainerKind::Date => "date",
            ContainerKind::NumericBuffer => "typed array",
        }
    }

    /// Sequence-like kinds address elements by numeric index.
    pub fn is_indexed(self) -> bool {
        matches!(self, ContainerKind::Sequence | ContainerKind::NumericBuffer)
    }
}

impl Container {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Object(_) => ContainerKind::PlainObject,
            Container::Array(_) => ContainerKind::Sequence,
            Container::Map(_) => ContainerKind::Map,
            Container::Set(_) => ContainerKind::Set,
            Container::Date(_) => ContainerKind::Date,
            Container::Buffer(_) => ContainerKind::NumericBuffer,
        }
    }

    /// Natural (uninstrumented) property resolution.
    pub fn get(&self, key: &PathStep) -> Value {
        match (self, key) {
            (Container::Object(props), PathStep::Key(name)) => {
                props.get(name).cloned().unwrap_or_default()
            }
            (Container::Array(items), PathStep::Index(i)) => {
                items.get(*i).cloned().unwrap_or_default()
            }
            (Container::Array(items), PathStep::Key(name)) if name == "length" => {
                Value::from(items.len())
            }
            (Container::Buffer(buffer), PathStep::Index(i)) => {
                buffer.get(*i).map_or(Value::Undefined, Value::Number)
            }
            (Container::Buffer(buffer), PathStep::Key(name)) if name == "length" => {
                Value::from(buffer.len())
            }
            (Container::Map(entries), PathStep::Key(name)) if name == "size" => {
                Value::from(entries.len())
            }
            (Container::Set(items), PathStep::Key(name)) if name == "size" => {
                Value::from(items.len())
            }
            _ => Value::Undefined,
        }
    }

    /// Object-valued children with the key each is reachable under.
    pub(crate) fn object_children(&self) -> Vec<(PathStep, Object)> {
        match self {
            Container::Object(props) => props
                .iter()
                .filter_map(|(k, v)| v.as_object().map(|o| (PathStep::Key(k.clone()), o.clone())))
                .collect(),
            Container::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_object().map(|o| (PathStep::Index(i), o.clone())))
                .collect(),
            Container::Map(entries) => entries
                .iter()
                .filter_map(|(k, v)| v.as_object().map(|o| (PathStep::MapKey(k.clone()), o.clone())))
                .collect(),
            Container::Set(_) | Container::Date(_) | Container::Buffer(_) => Vec::new(),
        }
    }
}

pub(crate) struct ObjectCell {
    pub(crate) data: RefCell<Container>,
    pub(crate) state: OnceCell<Rc<RefCell<ListenerState>>>,
}

/// Reference-counted handle to a mutable container.
///
/// Cloning the handle shares the container. Mutating through the handle
/// directly bypasses every listener; go through the container's
/// [`ListeningProxy`](crate::ListeningProxy) to have changes observed.
#[derive(Clone)]
pub struct Object(pub(crate) Rc<ObjectCell>);

impl Object {
    pub fn new(container: Container) -> Self {
        Object(Rc::new(ObjectCell {
            data: RefCell::new(container),
            state: OnceCell::new(),
        }))
    }

    pub fn plain<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::new(Container::Object(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::new(Container::Array(items.into_iter().collect()))
    }

    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        Self::new(Container::Map(entries.into_iter().collect()))
    }

    pub fn set<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::new(Container::Set(items.into_iter().collect()))
    }

    pub fn date(date: DateValue) -> Self {
        Self::new(Container::Date(date))
    }

    pub fn buffer(buffer: NumericBuffer) -> Self {
        Self::new(Container::Buffer(buffer))
    }

    pub fn borrow(&self) -> Ref<'_, Container> {
        self.0.data.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Container> {
        self.0.data.borrow_mut()
    }

    pub fn kind(&self) -> ContainerKind {
        self.borrow().kind()
    }

    /// Natural read of a key, bypassing listeners.
    pub fn get(&self, key: impl Into<PathStep>) -> Value {
        self.borrow().get(&key.into())
    }

    /// Raw property write on a plain object, bypassing listeners.
    pub fn insert_raw(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        match &mut *self.borrow_mut() {
            Container::Object(props) => props.insert(key.into(), value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match &*self.borrow() {
            Container::Object(props) => props.len(),
            Container::Array(items) => items.len(),
            Container::Map(entries) => entries.len(),
            Container::Set(items) => items.len(),
            Container::Date(_) => 0,
            Container::Buffer(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once a [`ListeningProxy`](crate::ListeningProxy) has been created for this container.
    pub fn is_wrapped(&self) -> bool {
        self.0.state.get().is_some()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectCell> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn to_display_string(&self) -> String {
        match &*self.borrow() {
            Container::Array(items) => crate::sequence::join_items(items, ","),
            Container::Buffer(buffer) => buffer
                .iter()
                .map(crate::value::format_number)
                .collect::<Vec<_>>()
                .join(","),
            Container::Date(date) => date.to_date_time_string(),
            Container::Map(_) => "[object Map]".to_string(),
            Container::Set(_) => "[object Set]".to_string(),
            Container::Object(_) => "[object Object]".to_string(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0.data.try_borrow() {
            Ok(data) => data.kind().name(),
            Err(_) => "borrowed",
        };
        write!(f, "Object<{kind}>({:#x})", self.addr())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}
