//! The event model.
//!
//! A single [`Event`] is created per firing and handed by `&mut` to every
//! listener on the originating wrapper and then to every listener on each
//! parent it bubbles through. Its path grows at the front as it bubbles, so
//! listeners that want to keep what they saw should take a [`Event::snapshot`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ListenerError, ProxyError};
use crate::listeners::Listener;
use crate::object::Object;
use crate::path::PathStep;
use crate::proxy::ListeningProxy;
use crate::value::{Function, Value};

pub const EVENT_TYPE_BEFORE_CHANGE: &str = "beforeChange";
pub const EVENT_TYPE_AFTER_CHANGE: &str = "afterChange";
pub const EVENT_TYPE_GET_PROPERTY: &str = "getProperty";
pub const EVENT_TYPE_GET_TREEWALKER: &str = "getTreewalker";
pub const EVENT_TYPE_EXCEPTION_HANDLER: &str = "exceptionHandler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    BeforeChange,
    AfterChange,
    GetProperty,
    GetTreewalker,
    ExceptionHandler,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::BeforeChange,
        EventType::AfterChange,
        EventType::GetProperty,
        EventType::GetTreewalker,
        EventType::ExceptionHandler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::BeforeChange => EVENT_TYPE_BEFORE_CHANGE,
            EventType::AfterChange => EVENT_TYPE_AFTER_CHANGE,
            EventType::GetProperty => EVENT_TYPE_GET_PROPERTY,
            EventType::GetTreewalker => EVENT_TYPE_GET_TREEWALKER,
            EventType::ExceptionHandler => EVENT_TYPE_EXCEPTION_HANDLER,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn propagates(self) -> bool {
        true
    }

    pub fn preventable(self) -> bool {
        matches!(
            self,
            EventType::BeforeChange | EventType::GetProperty | EventType::GetTreewalker
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProxyError::UnknownEventType(s.to_string()))
    }
}

/// Anything that names an event type: the enum itself or its string identifier.
pub trait IntoEventType {
    fn into_event_type(self) -> Result<EventType, ProxyError>;
}

impl IntoEventType for EventType {
    fn into_event_type(self) -> Result<EventType, ProxyError> {
        Ok(self)
    }
}

impl IntoEventType for &str {
    fn into_event_type(self) -> Result<EventType, ProxyError> {
        self.parse()
    }
}

impl IntoEventType for String {
    fn into_event_type(self) -> Result<EventType, ProxyError> {
        self.parse()
    }
}

impl IntoEventType for &String {
    fn into_event_type(self) -> Result<EventType, ProxyError> {
        self.parse()
    }
}

/// The underlying mutation a [`EventType::BeforeChange`] event represents.
pub type DefaultAction = Box<dyn FnOnce() -> Result<Value, ProxyError>>;

/// Fields shared by before/after change events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    pub action: String,
    pub property: Option<PathStep>,
    pub value: Value,
    pub was_value: Value,
    pub arguments: Vec<Value>,
}

impl Change {
    pub fn new(action: impl Into<String>) -> Self {
        Change {
            action: action.into(),
            ..Change::default()
        }
    }

    pub fn property(mut self, property: impl Into<PathStep>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn was_value(mut self, was_value: Value) -> Self {
        self.was_value = was_value;
        self
    }

    pub fn arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

pub struct BeforeChange {
    change: Change,
    default_action: Option<DefaultAction>,
    default_prevented: bool,
    default_performed: bool,
    default_result: Option<Value>,
}

impl BeforeChange {
    pub fn change(&self) -> &Change {
        &self.change
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Runs the default action now, at most once and never after it was prevented.
    pub fn perform_default(&mut self) -> Result<Option<Value>, ProxyError> {
        if self.default_performed || self.default_prevented {
            return Ok(None);
        }
        self.default_performed = true;
        let Some(action) = self.default_action.take() else {
            return Ok(None);
        };
        let result = action()?;
        self.default_result = Some(result.clone());
        Ok(Some(result))
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn default_performed(&self) -> bool {
        self.default_performed
    }

    pub fn default_result(&self) -> Option<&Value> {
        self.default_result.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct AfterChange {
    change: Change,
}

impl AfterChange {
    pub fn change(&self) -> &Change {
        &self.change
    }
}

#[derive(Debug, Clone)]
pub struct GetProperty {
    property: PathStep,
    default_result: Value,
    result: Value,
    default_prevented: bool,
    fires_before_and_after: bool,
    as_action: Option<String>,
}

impl GetProperty {
    pub fn property(&self) -> &PathStep {
        &self.property
    }

    pub fn default_result(&self) -> &Value {
        &self.default_result
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn fires_before_and_after(&self) -> bool {
        self.fires_before_and_after
    }

    pub fn as_action(&self) -> Option<&str> {
        self.as_action.as_deref()
    }

    /// Substitutes the read result. Only the first substitution counts.
    ///
    /// With `fires_before_and_after` set and a callable replacement, invoking
    /// the returned callable fires a before/after change pair whose action is
    /// `[[as_action]]` (defaulting to the property name).
    fn substitute(
        &mut self,
        replacement: Value,
        fires_before_and_after: bool,
        as_action: Option<&str>,
    ) -> bool {
        if self.default_prevented {
            return false;
        }
        self.default_prevented = true;
        self.fires_before_and_after =
            fires_before_and_after && matches!(replacement, Value::Function(_));
        if self.fires_before_and_after {
            let name = match as_action {
                Some(action) => action.to_string(),
                None => self.property.to_string(),
            };
            self.as_action = Some(format!("[[{name}]]"));
        }
        self.result = replacement;
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetTreewalker {
    default_prevented: bool,
    tree_walker: Option<Function>,
}

impl GetTreewalker {
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn tree_walker(&self) -> Option<&Function> {
        self.tree_walker.as_ref()
    }
}

#[derive(Clone)]
pub struct ExceptionHandler {
    exception: ListenerError,
    handler: Listener,
    event: Box<EventSnapshot>,
}

impl ExceptionHandler {
    pub fn exception(&self) -> &ListenerError {
        &self.exception
    }

    /// The listener that raised.
    pub fn handler(&self) -> &Listener {
        &self.handler
    }

    /// The failing event as it was when the listener raised.
    pub fn event(&self) -> &EventSnapshot {
        &self.event
    }
}

pub enum EventDetail {
    BeforeChange(BeforeChange),
    AfterChange(AfterChange),
    GetProperty(GetProperty),
    GetTreewalker(GetTreewalker),
    ExceptionHandler(ExceptionHandler),
}

pub struct Event {
    origin: ListeningProxy,
    path: Vec<PathStep>,
    propagation_stopped: bool,
    detail: EventDetail,
}

impl Event {
    fn with_detail(origin: ListeningProxy, detail: EventDetail) -> Self {
        Event {
            origin,
            path: Vec::new(),
            propagation_stopped: false,
            detail,
        }
    }

    pub(crate) fn before_change(
        origin: ListeningProxy,
        change: Change,
        default_action: DefaultAction,
    ) -> Self {
        Self::with_detail(
            origin,
            EventDetail::BeforeChange(BeforeChange {
                change,
                default_action: Some(default_action),
                default_prevented: false,
                default_performed: false,
                default_result: None,
            }),
        )
    }

    pub(crate) fn after_change(origin: ListeningProxy, change: Change) -> Self {
        Self::with_detail(origin, EventDetail::AfterChange(AfterChange { change }))
    }

    pub(crate) fn get_property(
        origin: ListeningProxy,
        property: PathStep,
        default_result: Value,
    ) -> Self {
        Self::with_detail(
            origin,
            EventDetail::GetProperty(GetProperty {
                property,
                result: default_result.clone(),
                default_result,
                default_prevented: false,
                fires_before_and_after: false,
                as_action: None,
            }),
        )
    }

    pub(crate) fn get_treewalker(origin: ListeningProxy) -> Self {
        Self::with_detail(origin, EventDetail::GetTreewalker(GetTreewalker::default()))
    }

    pub(crate) fn exception_handler(
        origin: ListeningProxy,
        exception: ListenerError,
        handler: Listener,
        event: EventSnapshot,
    ) -> Self {
        let path = event.path.clone();
        let mut handler_event = Self::with_detail(
            origin,
            EventDetail::ExceptionHandler(ExceptionHandler {
                exception,
                handler,
                event: Box::new(event),
            }),
        );
        handler_event.path = path;
        handler_event
    }

    pub fn event_type(&self) -> EventType {
        match &self.detail {
            EventDetail::BeforeChange(_) => EventType::BeforeChange,
            EventDetail::AfterChange(_) => EventType::AfterChange,
            EventDetail::GetProperty(_) => EventType::GetProperty,
            EventDetail::GetTreewalker(_) => EventType::GetTreewalker,
            EventDetail::ExceptionHandler(_) => EventType::ExceptionHandler,
        }
    }

    /// The underlying value the event originated on.
    pub fn target(&self) -> Object {
        self.origin.target()
    }

    /// The wrapper the event originated on.
    pub fn proxy(&self) -> ListeningProxy {
        self.origin.clone()
    }

    /// Keys from the listener's own wrapper down to the originating wrapper.
    pub fn path(&self) -> Vec<PathStep> {
        self.path.clone()
    }

    pub(crate) fn path_ref(&self) -> &[PathStep] {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: Vec<PathStep>) {
        self.path = path;
    }

    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    pub fn detail_mut(&mut self) -> &mut EventDetail {
        &mut self.detail
    }

    pub fn propagates(&self) -> bool {
        self.event_type().propagates()
    }

    pub fn preventable(&self) -> bool {
        self.event_type().preventable()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    fn change(&self) -> Option<&Change> {
        match &self.detail {
            EventDetail::BeforeChange(before) => Some(&before.change),
            EventDetail::AfterChange(after) => Some(&after.change),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.change().map(|c| c.action.as_str())
    }

    pub fn property(&self) -> Option<&PathStep> {
        match &self.detail {
            EventDetail::GetProperty(get) => Some(&get.property),
            _ => self.change().and_then(|c| c.property.as_ref()),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.change().map(|c| &c.value)
    }

    pub fn was_value(&self) -> Option<&Value> {
        self.change().map(|c| &c.was_value)
    }

    pub fn arguments(&self) -> Vec<Value> {
        self.change().map(|c| c.arguments.clone()).unwrap_or_default()
    }

    pub fn default_prevented(&self) -> bool {
        match &self.detail {
            EventDetail::BeforeChange(before) => before.default_prevented,
            EventDetail::GetProperty(get) => get.default_prevented,
            EventDetail::GetTreewalker(walker) => walker.default_prevented,
            _ => false,
        }
    }

    pub fn default_performed(&self) -> bool {
        match &self.detail {
            EventDetail::BeforeChange(before) => before.default_performed,
            _ => false,
        }
    }

    pub(crate) fn default_result(&self) -> Option<&Value> {
        match &self.detail {
            EventDetail::BeforeChange(before) => before.default_result.as_ref(),
            _ => None,
        }
    }

    /// Cancels the default behaviour.
    ///
    /// On a get-property event this substitutes `undefined` as the result. A
    /// get-treewalker event needs a replacement walker, see
    /// [`Event::use_tree_walker`].
    pub fn prevent_default(&mut self) -> Result<(), ProxyError> {
        match &mut self.detail {
            EventDetail::BeforeChange(before) => {
                before.prevent_default();
                Ok(())
            }
            EventDetail::GetProperty(get) => {
                if get.substitute(Value::Undefined, false, None) {
                    self.propagation_stopped = true;
                }
                Ok(())
            }
            EventDetail::GetTreewalker(_) => Err(ProxyError::InvalidTreewalkerOverride),
            _ => Err(ProxyError::NotPreventable(self.event_type())),
        }
    }

    /// Runs the default action of a before-change event early.
    pub fn perform_default(&mut self) -> Result<Option<Value>, ProxyError> {
        match &mut self.detail {
            EventDetail::BeforeChange(before) => before.perform_default(),
            _ => Err(ProxyError::NotPreventable(self.event_type())),
        }
    }

    /// Substitutes the result of a get-property event.
    pub fn replace_result(&mut self, replacement: impl Into<Value>) -> Result<(), ProxyError> {
        self.substitute_result(replacement.into(), false, None)
    }

    /// Substitutes a callable result whose invocation fires before/after
    /// change events with action `[[as_action]]`.
    pub fn replace_result_as_action(
        &mut self,
        replacement: impl Into<Value>,
        as_action: Option<&str>,
    ) -> Result<(), ProxyError> {
        self.substitute_result(replacement.into(), true, as_action)
    }

    fn substitute_result(
        &mut self,
        replacement: Value,
        fires_before_and_after: bool,
        as_action: Option<&str>,
    ) -> Result<(), ProxyError> {
        match &mut self.detail {
            EventDetail::GetProperty(get) => {
                if get.substitute(replacement, fires_before_and_after, as_action) {
                    self.propagation_stopped = true;
                }
                Ok(())
            }
            _ => Err(ProxyError::NotPreventable(self.event_type())),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.detail {
            EventDetail::GetProperty(get) => Some(&get.result),
            _ => None,
        }
    }

    pub fn fires_before_and_after(&self) -> bool {
        match &self.detail {
            EventDetail::GetProperty(get) => get.fires_before_and_after,
            _ => false,
        }
    }

    pub fn as_action(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::GetProperty(get) => get.as_action(),
            _ => None,
        }
    }

    /// Replaces the default tree walk. The walker is called with the wrapper's
    /// target as its only argument and must be a function.
    pub fn use_tree_walker(&mut self, walker: impl Into<Value>) -> Result<(), ProxyError> {
        let walker = match walker.into() {
            Value::Function(function) => function,
            _ => return Err(ProxyError::InvalidTreewalkerOverride),
        };
        match &mut self.detail {
            EventDetail::GetTreewalker(get) => {
                if !get.default_prevented {
                    get.default_prevented = true;
                    get.tree_walker = Some(walker);
                    self.propagation_stopped = true;
                }
                Ok(())
            }
            _ => Err(ProxyError::NotPreventable(self.event_type())),
        }
    }

    /// Typed variant of [`Event::use_tree_walker`].
    pub fn use_tree_walker_fn<F>(&mut self, walker: F) -> Result<(), ProxyError>
    where
        F: Fn(&ListeningProxy) -> Result<(), ListenerError> + 'static,
    {
        let function = Function::new(move |_this, args| {
            let proxy = args
                .first()
                .and_then(Value::as_proxy)
                .ok_or_else(|| ListenerError::new(ProxyError::NotAProxy("tree walker argument".into())))?;
            walker(&proxy)?;
            Ok(Value::Undefined)
        });
        self.use_tree_walker(function)
    }

    pub(crate) fn tree_walker(&self) -> Option<Function> {
        match &self.detail {
            EventDetail::GetTreewalker(get) => get.tree_walker.clone(),
            _ => None,
        }
    }

    pub fn exception(&self) -> Option<&ListenerError> {
        match &self.detail {
            EventDetail::ExceptionHandler(handler) => Some(&handler.exception),
            _ => None,
        }
    }

    /// The listener whose failure an exception-handler event reports.
    pub fn handler(&self) -> Option<&Listener> {
        match &self.detail {
            EventDetail::ExceptionHandler(handler) => Some(&handler.handler),
            _ => None,
        }
    }

    pub fn original_event(&self) -> Option<&EventSnapshot> {
        match &self.detail {
            EventDetail::ExceptionHandler(handler) => Some(&handler.event),
            _ => None,
        }
    }

    /// A plain capture of every current field value.
    pub fn snapshot(&self) -> EventSnapshot {
        let event_type = self.event_type();
        let mut snapshot = EventSnapshot {
            event_type,
            path: self.path.clone(),
            action: None,
            property: None,
            value: None,
            was_value: None,
            arguments: None,
            propagates: event_type.propagates(),
            preventable: event_type.preventable(),
            propagation_stopped: self.propagation_stopped,
            default_prevented: None,
            default_performed: None,
            fires_before_and_after: None,
            as_action: None,
            result: None,
            exception: None,
            event: None,
        };
        match &self.detail {
            EventDetail::BeforeChange(before) => {
                snapshot.fill_change(&before.change);
                snapshot.default_prevented = Some(before.default_prevented);
                snapshot.default_performed = Some(before.default_performed);
            }
            EventDetail::AfterChange(after) => snapshot.fill_change(&after.change),
            EventDetail::GetProperty(get) => {
                snapshot.property = Some(get.property.clone());
                snapshot.default_prevented = Some(get.default_prevented);
                snapshot.fires_before_and_after = Some(get.fires_before_and_after);
                snapshot.as_action = get.as_action.clone();
                snapshot.result = Some(get.result.clone());
            }
            EventDetail::GetTreewalker(walker) => {
                snapshot.default_prevented = Some(walker.default_prevented);
            }
            EventDetail::ExceptionHandler(handler) => {
                snapshot.exception = Some(handler.exception.message());
                snapshot.event = Some(handler.event.clone());
            }
        }
        snapshot
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type())
            .field("path", &self.path)
            .field("action", &self.action())
            .field("property", &self.property())
            .field("propagation_stopped", &self.propagation_stopped)
            .finish()
    }
}

/// Serializable capture of an event at the moment it was taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub path: Vec<PathStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<PathStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Value>>,
    pub propagates: bool,
    pub preventable: bool,
    pub propagation_stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prevented: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_performed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fires_before_and_after: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Box<EventSnapshot>>,
}

impl EventSnapshot {
    fn fill_change(&mut self, change: &Change) {
        self.action = Some(change.action.clone());
        self.property = change.property.clone();
        self.value = Some(change.value.clone());
        self.was_value = Some(change.was_value.clone());
        self.arguments = Some(change.arguments.clone());
    }
}
