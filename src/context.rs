use crate::namespace::{NamespaceMap, NamespaceResolver};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Name -> value storage consulted during resolution.
///
/// `get` returns `None` for unbound names; a name bound to null yields
/// `Some(Value::Null)` and `has` reports it as present.
pub trait VariableStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;
    fn set(&self, name: &str, value: Value);
    fn has(&self, name: &str) -> bool;
}

/// A variable store plus optional capabilities probed by the resolver.
pub trait Context: VariableStore {
    /// Namespaces supplied by the context itself, consulted before the engine's.
    fn namespace_resolver(&self) -> Option<&dyn NamespaceResolver> {
        None
    }

    /// Whether this context is published to the thread scope during a run.
    fn thread_scoped(&self) -> bool {
        false
    }
}

/// HashMap-backed context.
///
/// The lock keeps individual calls safe when the context is shared between
/// threads; compound updates still need synchronizing by the caller.
#[derive(Default)]
pub struct MapContext {
    vars: RwLock<HashMap<String, Value>>,
    namespaces: Option<NamespaceMap>,
    thread_scoped: bool,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level keys of a JSON object become variables; other values yield an empty context.
    pub fn from_json(value: Value) -> Self {
        let vars = match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self {
            vars: RwLock::new(vars),
            ..Self::default()
        }
    }

    pub fn with_thread_scope(mut self) -> Self {
        self.thread_scoped = true;
        self
    }

    pub fn with_namespaces(mut self, namespaces: NamespaceMap) -> Self {
        self.namespaces = Some(namespaces);
        self
    }

    pub fn with_var(mut self, name: &str, value: Value) -> Self {
        self.vars.get_mut().insert(name.to_string(), value);
        self
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.vars.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.read().is_empty()
    }

    /// Snapshot of the variables as a JSON object.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .vars
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }
}

impl VariableStore for MapContext {
    fn get(&self, name: &str) -> Option<Value> {
        self.vars.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) {
        self.vars.write().insert(name.to_string(), value);
    }

    fn has(&self, name: &str) -> bool {
        self.vars.read().contains_key(name)
    }
}

impl Context for MapContext {
    fn namespace_resolver(&self) -> Option<&dyn NamespaceResolver> {
        self.namespaces.as_ref().map(|ns| ns as &dyn NamespaceResolver)
    }

    fn thread_scoped(&self) -> bool {
        self.thread_scoped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn null_is_distinct_from_unbound() {
        let ctx = MapContext::new().with_var("n", Value::Null);
        assert!(ctx.has("n"));
        assert_eq!(ctx.get("n"), Some(Value::Null));
        assert!(!ctx.has("missing"));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn set_creates_and_overwrites() {
        let ctx = MapContext::new();
        ctx.set("a", json!(1));
        ctx.set("a", json!(2));
        assert_eq!(ctx.get("a"), Some(json!(2)));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.remove("a"), Some(json!(2)));
        assert!(ctx.is_empty());
    }

    #[test]
    fn from_json_object() {
        let ctx = MapContext::from_json(json!({"a.b": 1, "x": {"y": 2}}));
        assert!(ctx.has("a.b"));
        assert_eq!(ctx.get("x"), Some(json!({"y": 2})));
        assert_eq!(ctx.to_json(), json!({"a.b": 1, "x": {"y": 2}}));
        assert!(MapContext::from_json(json!([1, 2])).is_empty());
    }

    #[test]
    fn capabilities_default_off() {
        let ctx = MapContext::new();
        assert!(!ctx.thread_scoped());
        assert!(ctx.namespace_resolver().is_none());
        let ctx = MapContext::new()
            .with_thread_scope()
            .with_namespaces(NamespaceMap::new());
        assert!(ctx.thread_scoped());
        assert!(ctx.namespace_resolver().is_some());
    }
}
