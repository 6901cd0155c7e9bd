//! Error types.
//!
//! [`ProxyError`] covers programmer errors raised synchronously at the point of
//! violation (before any event fires). [`ListenerError`] is the recoverable
//! "exception" a listener or callable returns; it travels through the
//! exception-handler chain and only surfaces as [`ProxyError::Listener`] when a
//! handler re-raises it.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::events::EventType;
use crate::path::PathStep;

#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error("listening proxy can only be created on objects or arrays")]
    InvalidTarget,
    #[error("event type '{0}' unknown")]
    UnknownEventType(String),
    #[error("'{0}' is not a function")]
    NotAFunction(String),
    #[error("property '{property}' cannot be {operation} on listening proxy")]
    ProtectedProperty {
        property: String,
        operation: &'static str,
    },
    #[error("supplied tree walker on get treewalker event must be a function")]
    InvalidTreewalkerOverride,
    #[error("{0} events cannot be prevented")]
    NotPreventable(EventType),
    #[error("{0} is not a listening proxy")]
    NotAProxy(String),
    #[error("operation '{operation}' is not supported on {kind}")]
    UnsupportedOperation {
        operation: String,
        kind: &'static str,
    },
    #[error("invalid argument for {operation}: {reason}")]
    InvalidArgument {
        operation: String,
        reason: String,
    },
    #[error("{0}")]
    Listener(ListenerError),
}

impl ProxyError {
    pub(crate) fn protected(step: &PathStep, operation: &'static str) -> Self {
        ProxyError::ProtectedProperty {
            property: step.to_string(),
            operation,
        }
    }

    pub(crate) fn unsupported(operation: impl Into<String>, kind: &'static str) -> Self {
        ProxyError::UnsupportedOperation {
            operation: operation.into(),
            kind,
        }
    }

    pub(crate) fn invalid_argument(operation: &str, reason: impl Into<String>) -> Self {
        ProxyError::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ListenerError> for ProxyError {
    fn from(err: ListenerError) -> Self {
        // Unwrap errors that are themselves surfaced listener errors so nested
        // re-entrant operations do not stack wrappers.
        match err.downcast_ref::<ProxyError>() {
            Some(ProxyError::Listener(inner)) => ProxyError::Listener(inner.clone()),
            _ => ProxyError::Listener(err),
        }
    }
}

/// Cloneable error returned by listeners and callables.
///
/// Like `anyhow::Error` this type deliberately does not implement
/// [`std::error::Error`], which allows a blanket conversion from every error
/// type so `?` works inside listener bodies.
#[derive(Clone)]
pub struct ListenerError {
    inner: Rc<dyn std::error::Error + 'static>,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

impl ListenerError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self { inner: Rc::new(err) }
    }

    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(Message(message.to_string()))
    }

    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Identity comparison: `true` when both handles carry the same raised error.
    pub fn ptr_eq(&self, other: &ListenerError) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> From<E> for ListenerError
where
    E: std::error::Error + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

impl fmt::Debug for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerError").field(&self.inner).finish()
    }
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
