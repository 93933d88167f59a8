use crate::context::Context;
use crate::errors::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Namespace tag used by the engine itself.
pub const ENGINE_NAMESPACE: &str = "engine";
/// Engine namespace whose functions run without a thread-scoped context.
pub const UNSCOPED_ENGINE_NAMESPACE: &str = "uengine";
pub const RESERVED_NAMESPACES: [&str; 2] = [ENGINE_NAMESPACE, UNSCOPED_ENGINE_NAMESPACE];

/// Variables the engine may bind for its own bookkeeping.
pub const RESERVED_VARIABLES: [&str; 2] = ["$engine", "$uengine"];

pub fn is_reserved_namespace(tag: &str) -> bool {
    RESERVED_NAMESPACES.contains(&tag)
}

pub fn is_reserved_variable(name: &str) -> bool {
    RESERVED_VARIABLES.contains(&name)
}

/// A named group of functions reachable through `tag:function(...)` call sites.
pub trait Namespace: Send + Sync {
    fn call(&self, function: &str, args: &[Value]) -> Result<Value>;

    /// Present when the namespace wants a per-run delegate instead of itself.
    fn functor(&self) -> Option<&dyn NamespaceFunctor> {
        None
    }
}

/// Creates the delegate that replaces a namespace for the length of one run.
pub trait NamespaceFunctor: Send + Sync {
    fn create_functor(&self, ctx: &dyn Context) -> Result<Arc<dyn Namespace>>;
}

impl<F> NamespaceFunctor for F
where
    F: Fn(&dyn Context) -> Result<Arc<dyn Namespace>> + Send + Sync,
{
    fn create_functor(&self, ctx: &dyn Context) -> Result<Arc<dyn Namespace>> {
        self(ctx)
    }
}

/// Maps a namespace tag to its target.
pub trait NamespaceResolver: Send + Sync {
    fn resolve_namespace(&self, tag: &str) -> Option<Arc<dyn Namespace>>;
}

/// Thread-safe tag -> namespace map; clones share storage until modified.
#[derive(Clone, Default)]
pub struct NamespaceMap {
    inner: Arc<HashMap<String, Arc<dyn Namespace>>>,
}

impl NamespaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<N: Namespace + 'static>(&mut self, tag: &str, ns: N) {
        self.register_arc(tag, Arc::new(ns));
    }

    pub fn register_arc(&mut self, tag: &str, ns: Arc<dyn Namespace>) {
        let mut_map = Arc::make_mut(&mut self.inner);
        mut_map.insert(tag.to_string(), ns);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Namespace>> {
        self.inner.get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.inner.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl NamespaceResolver for NamespaceMap {
    fn resolve_namespace(&self, tag: &str) -> Option<Arc<dyn Namespace>> {
        self.get(tag)
    }
}
