//! Identifier and namespace resolution for expression evaluators.
//!
//! An evaluator hands free identifiers to a [`Resolver`]:
//!
//! * dotted names (`x.y.z`) resolve by trying the longest bound dotted prefix
//!   first and leaving the rest to member access,
//! * `tag:function` call sites resolve to a namespace, or to the functor that
//!   namespace creates once per run,
//! * contexts that opt in are bound to the current thread for the length of a
//!   run so re-entrant calls can find them.

pub mod errors;
pub mod context;
pub mod engine;
pub mod functions;
pub mod functor_cache;
pub mod name;
pub mod namespace;
pub mod thread_scope;
mod parser;

use serde_json::Value;
use std::sync::Arc;

pub use context::{Context, MapContext, VariableStore};
pub use engine::{ReservedPolicy, Resolver, ResolverOptions, Run};
pub use errors::{ResolveError, Result};
pub use functions::{Function, FunctionTable};
pub use functor_cache::{FunctorCache, RunId};
pub use name::{Binding, Name};
pub use namespace::{Namespace, NamespaceFunctor, NamespaceMap, NamespaceResolver};
pub use thread_scope::{current_context, enter_thread_scope, exit_thread_scope, ScopeHandle};

/// Convenience: resolve a dotted name against `ctx` with default options.
pub fn resolve(name: &str, ctx: &dyn VariableStore) -> Result<Binding> {
    Resolver::default().resolve(&Name::parse(name)?, ctx)
}

/// Convenience: resolve and follow members, in a run of its own.
pub fn resolve_value(name: &str, ctx: Arc<dyn Context>, options: ResolverOptions) -> Result<Value> {
    let name = Name::parse(name)?;
    Resolver::new(options).evaluate(ctx, |run| run.resolve_value(&name))
}
