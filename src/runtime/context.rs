//! The ambient per-request context available to templates as `@context`.
//!
//! Unlike model access, context lookups are dynamic: keys are resolved at
//! render time against a tree of nodes, and a missing key renders as empty
//! rather than failing. This is the single dynamic surface of an otherwise
//! statically checked renderer.

use std::collections::BTreeMap;

/// A node in the context tree.
pub trait ContextNode {
    /// Child lookup; `None` when the key is absent or this is a leaf.
    fn child(&self, name: &str) -> Option<&dyn ContextNode>;

    /// The text rendition of this node, `None` for non-leaf nodes.
    fn value(&self) -> Option<String>;
}

/// The context used when none is supplied: every lookup misses.
pub struct EmptyContext;

impl ContextNode for EmptyContext {
    fn child(&self, _name: &str) -> Option<&dyn ContextNode> {
        None
    }

    fn value(&self) -> Option<String> {
        None
    }
}

/// A context tree value: leaf text or a nested map.
#[derive(Debug, Clone)]
pub enum ContextValue {
    Text(String),
    Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Sets a leaf at a dotted path, turning any non-map node along the
    /// way into a map.
    pub fn set_path(&mut self, path: &[&str], value: String) {
        let Some((first, rest)) = path.split_first() else {
            *self = ContextValue::Text(value);
            return;
        };
        if !matches!(self, ContextValue::Map(_)) {
            *self = ContextValue::Map(BTreeMap::new());
        }
        let ContextValue::Map(map) = self else { return };
        let child = map
            .entry((*first).to_string())
            .or_insert_with(|| ContextValue::Map(BTreeMap::new()));
        child.set_path(rest, value);
    }
}

impl ContextNode for ContextValue {
    fn child(&self, name: &str) -> Option<&dyn ContextNode> {
        match self {
            ContextValue::Map(map) => map.get(name).map(|v| v as &dyn ContextNode),
            ContextValue::Text(_) => None,
        }
    }

    fn value(&self) -> Option<String> {
        match self {
            ContextValue::Text(text) => Some(text.clone()),
            ContextValue::Map(_) => None,
        }
    }
}

/// A root context backed by a string-keyed map.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    entries: BTreeMap<String, ContextValue>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ContextValue) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Inserts a leaf value at a dotted path, creating intermediate maps as
    /// needed. Later insertions overwrite earlier ones, which is how inner
    /// context frames shadow outer ones when a scope is materialized.
    pub fn set_path(&mut self, path: &[&str], value: impl Into<String>) {
        let Some((first, rest)) = path.split_first() else { return };
        let child = self
            .entries
            .entry((*first).to_string())
            .or_insert_with(|| ContextValue::Map(BTreeMap::new()));
        child.set_path(rest, value.into());
    }
}

impl ContextNode for MapContext {
    fn child(&self, name: &str) -> Option<&dyn ContextNode> {
        self.entries.get(name).map(|v| v as &dyn ContextNode)
    }

    fn value(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lookup_walks_the_tree() {
        let ctx = MapContext::new().with(
            "csrf",
            ContextValue::Map(BTreeMap::from([(
                "token".to_string(),
                ContextValue::text("abc123"),
            )])),
        );
        let token = ctx
            .child("csrf")
            .and_then(|n| n.child("token"))
            .and_then(|n| n.value());
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn set_path_creates_nested_maps_and_overwrites() {
        let mut ctx = MapContext::new();
        ctx.set_path(&["csrf", "token"], "abc");
        ctx.set_path(&["user"], "ana");
        ctx.set_path(&["user"], "bo");

        assert_eq!(ctx.child("user").and_then(|n| n.value()).as_deref(), Some("bo"));
        let token = ctx
            .child("csrf")
            .and_then(|n| n.child("token"))
            .and_then(|n| n.value());
        assert_eq!(token.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_keys_resolve_to_none() {
        let ctx = MapContext::new();
        assert!(ctx.child("nope").is_none());
        assert!(EmptyContext.child("x").is_none());
        assert!(EmptyContext.value().is_none());
    }
}
