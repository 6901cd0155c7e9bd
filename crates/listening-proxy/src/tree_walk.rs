//! Wrapping and linking of nested object values.

use crate::error::ProxyError;
use crate::events::Event;
use crate::propagation;
use crate::proxy::ListeningProxy;
use crate::value::Value;

/// Walks the graph under an already-wrapped value.
///
/// A get-treewalker event fires first (and bubbles); a listener may replace
/// the walk entirely with a custom walker. Otherwise every object-valued
/// property, element or map value is wrapped and linked under its key.
/// Children that were already wrapped are re-linked but not walked again,
/// which also makes cyclic and shared structures terminate.
pub fn tree_walk(value: &Value) -> Result<(), ProxyError> {
    let proxy = value
        .as_proxy()
        .ok_or_else(|| ProxyError::NotAProxy("tree walk target".to_string()))?;
    walk(&proxy)
}

pub(crate) fn walk(proxy: &ListeningProxy) -> Result<(), ProxyError> {
    let mut event = Event::get_treewalker(proxy.clone());
    propagation::fire(proxy, &mut event)?;
    if let Some(walker) = event.tree_walker() {
        tracing::trace!(target: "listening_proxy", kind = proxy.kind().name(), "custom tree walk");
        walker.call(&Value::Undefined, &[Value::from(proxy)])?;
        return Ok(());
    }
    let children = proxy.target().borrow().object_children();
    tracing::trace!(
        target: "listening_proxy",
        kind = proxy.kind().name(),
        children = children.len(),
        "tree walk"
    );
    for (key, child) in children {
        proxy.attach(&child, key)?;
    }
    Ok(())
}
