use crate::context::Context;
use crate::errors::{ResolveError, Result};
use crate::namespace::{Namespace, NamespaceFunctor};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Trait for pluggable functions exposed through a namespace.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> RangeInclusive<usize>;
    fn call(&self, args: &[Value]) -> Result<Value>;
}

/// Adapts a closure into a [`Function`].
pub struct NativeFunction<F> {
    name: &'static str,
    arity: RangeInclusive<usize>,
    f: F,
}

impl<F> NativeFunction<F>
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    pub fn new(name: &'static str, arity: RangeInclusive<usize>, f: F) -> Self {
        Self { name, arity, f }
    }
}

impl<F> Function for NativeFunction<F>
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }
    fn arity(&self) -> RangeInclusive<usize> {
        self.arity.clone()
    }
    fn call(&self, args: &[Value]) -> Result<Value> {
        (self.f)(args)
    }
}

/// Thread-safe function table; the plain kind of namespace target.
#[derive(Clone, Default)]
pub struct FunctionTable {
    tag: String,
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl FunctionTable {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            inner: Arc::default(),
        }
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let mut_map = Arc::make_mut(&mut self.inner);
        mut_map.insert(f.name(), Arc::new(f));
    }

    pub fn with<F: Function + 'static>(mut self, f: F) -> Self {
        self.register(f);
        self
    }

    pub fn with_fn<F>(self, name: &'static str, arity: RangeInclusive<usize>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.with(NativeFunction::new(name, arity, f))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.inner.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Attach a functor so every run receives its own delegate.
    pub fn with_functor<N: NamespaceFunctor + 'static>(self, functor: N) -> FunctorNamespace {
        FunctorNamespace {
            table: self,
            functor: Box::new(functor),
        }
    }
}

impl Namespace for FunctionTable {
    fn call(&self, function: &str, args: &[Value]) -> Result<Value> {
        let f = self.get(function).ok_or_else(|| ResolveError::UnknownFunction {
            namespace: self.tag.clone(),
            function: function.to_string(),
        })?;
        let arity = f.arity();
        if !arity.contains(&args.len()) {
            return Err(ResolveError::ArityMismatch {
                function: format!("{}:{}", self.tag, function),
                expected: format!("{}..={}", arity.start(), arity.end()),
                got: args.len(),
            });
        }
        f.call(args)
    }
}

/// A function table that hands out a per-run delegate through its functor.
///
/// Called directly (without a run), it dispatches to its own table.
pub struct FunctorNamespace {
    table: FunctionTable,
    functor: Box<dyn NamespaceFunctor>,
}

impl FunctorNamespace {
    pub fn table(&self) -> &FunctionTable {
        &self.table
    }
}

impl Namespace for FunctorNamespace {
    fn call(&self, function: &str, args: &[Value]) -> Result<Value> {
        self.table.call(function, args)
    }

    fn functor(&self) -> Option<&dyn NamespaceFunctor> {
        Some(self.functor.as_ref())
    }
}

/// Convenience for functors: build the per-run table from the active context.
pub fn functor_from<F>(f: F) -> impl NamespaceFunctor
where
    F: Fn(&dyn Context) -> Result<FunctionTable> + Send + Sync,
{
    move |ctx: &dyn Context| -> Result<Arc<dyn Namespace>> { Ok(Arc::new(f(ctx)?)) }
}
