//! Event bubbling and the exception-handler path.
//!
//! An event is dispatched to the originating wrapper's listeners in
//! registration order, then re-dispatched once per `(parent, key)` link with
//! the key prepended to the path. Listeners nearer the change always run
//! before listeners further up. A node already on the current bubble chain is
//! not visited again, so cyclic graphs terminate.

use crate::error::{ListenerError, ProxyError};
use crate::events::{Event, EventType};
use crate::listeners::Listener;
use crate::proxy::ListeningProxy;

/// Fires `event` on `origin` and bubbles it through every parent.
pub(crate) fn fire(origin: &ListeningProxy, event: &mut Event) -> Result<(), ProxyError> {
    let mut chain = Vec::new();
    dispatch(origin, event, &mut chain).map(|_| ())
}

/// Returns the number of listeners invoked along the bubble path.
fn dispatch(
    node: &ListeningProxy,
    event: &mut Event,
    chain: &mut Vec<usize>,
) -> Result<usize, ProxyError> {
    let addr = node.target().addr();
    if chain.contains(&addr) {
        return Ok(0);
    }
    chain.push(addr);
    let result = dispatch_at(node, event, chain);
    chain.pop();
    result
}

fn dispatch_at(
    node: &ListeningProxy,
    event: &mut Event,
    chain: &mut Vec<usize>,
) -> Result<usize, ProxyError> {
    let event_type = event.event_type();
    let listeners = node.state().borrow().listeners(event_type);
    let mut invoked = 0;
    for listener in listeners {
        invoked += 1;
        if let Err(err) = listener(event) {
            if event_type == EventType::ExceptionHandler {
                return Err(err.into());
            }
            fire_exception_handlers(node, err, &listener, event)?;
        }
        if event.propagation_stopped() {
            return Ok(invoked);
        }
    }

    let parents = node.parents();
    if parents.is_empty() {
        return Ok(invoked);
    }
    tracing::trace!(
        target: "listening_proxy",
        event_type = %event_type,
        parents = parents.len(),
        "bubbling"
    );
    let path = event.path();
    for (parent, keys) in parents {
        for key in keys {
            let mut bubbled = Vec::with_capacity(path.len() + 1);
            bubbled.push(key);
            bubbled.extend(path.iter().cloned());
            event.set_path(bubbled);
            let result = dispatch(&parent, event, chain);
            match result {
                Ok(count) => invoked += count,
                Err(err) => {
                    event.set_path(path);
                    return Err(err);
                }
            }
            if event.propagation_stopped() {
                event.set_path(path);
                return Ok(invoked);
            }
        }
    }
    event.set_path(path);
    Ok(invoked)
}

/// Routes a listener failure through exception handlers starting at the node
/// the failing listener was registered on. Returns an error only when a
/// handler re-raises.
pub(crate) fn fire_exception_handlers(
    node: &ListeningProxy,
    exception: ListenerError,
    handler: &Listener,
    original: &Event,
) -> Result<(), ProxyError> {
    let mut handler_event =
        Event::exception_handler(node.clone(), exception.clone(), handler.clone(), original.snapshot());
    let handled = dispatch(node, &mut handler_event, &mut Vec::new())?;
    if handled == 0 {
        tracing::error!(
            target: "listening_proxy",
            error = %exception,
            event_type = %original.event_type(),
            path = ?original.path_ref(),
            "unhandled exception in listener"
        );
    }
    Ok(())
}
