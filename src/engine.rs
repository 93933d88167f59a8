use crate::context::{Context, VariableStore};
use crate::errors::{ResolveError, Result};
use crate::functor_cache::{FunctorCache, RunId};
use crate::name::{Binding, Name};
use crate::namespace::{is_reserved_namespace, is_reserved_variable, Namespace, NamespaceMap};
use crate::parser;
use crate::thread_scope::{enter_thread_scope, ScopeHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// =========================
/// Options
/// =========================

/// What to do when a reserved namespace tag or variable is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservedPolicy {
    #[default]
    Reject,
    Permit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Look up dotted prefixes (`a.b.c`, `a.b`) before the root alone.
    pub antish: bool,
    /// Unresolved names are errors for `Run::resolve_value`; otherwise null.
    pub strict: bool,
    pub reserved: ReservedPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            antish: true,
            strict: true,
            reserved: ReservedPolicy::Reject,
        }
    }
}

impl ResolverOptions {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// =========================
/// Resolver
/// =========================

/// Binds identifiers and namespace tags to context state.
#[derive(Clone, Default)]
pub struct Resolver {
    options: ResolverOptions,
    namespaces: NamespaceMap,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            namespaces: NamespaceMap::new(),
        }
    }

    pub fn with_namespaces(mut self, namespaces: NamespaceMap) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn register_namespace<N: Namespace + 'static>(&mut self, tag: &str, ns: N) {
        self.namespaces.register(tag, ns);
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    /// Resolve a dotted name against `store`.
    ///
    /// The longest bound dotted prefix wins. If it covers the whole name the
    /// result is a context variable; otherwise the rest of the segments are
    /// handed back for member access on the bound value. With `antish`
    /// disabled only the root segment is looked up.
    pub fn resolve<S: VariableStore + ?Sized>(&self, name: &Name, store: &S) -> Result<Binding> {
        if is_reserved_variable(name.root()) && self.options.reserved == ReservedPolicy::Reject {
            warn!(name = %name, "reserved variable rejected");
            return Err(ResolveError::ReservedVariable {
                name: name.root().to_string(),
            });
        }
        let longest = if self.options.antish { name.len() } else { 1 };
        for k in (1..=longest).rev() {
            let key = name.prefix(k);
            trace!(key = %key, "probing context");
            if !store.has(&key) {
                continue;
            }
            let value = store.get(&key).unwrap_or(Value::Null);
            let binding = if k == name.len() {
                Binding::ContextVariable { key, value }
            } else {
                Binding::MemberChain {
                    root_key: key,
                    root: value,
                    remaining: name.segments()[k..].to_vec(),
                }
            };
            debug!(name = %name, bound = k, "resolved");
            return Ok(binding);
        }
        debug!(name = %name, "unresolved");
        Err(ResolveError::UnresolvedVariable {
            name: name.to_string(),
        })
    }

    /// Resolve `tag` to the object its functions dispatch to in this run.
    ///
    /// The context's own namespaces are consulted before the resolver's.
    /// `Ok(None)` means no namespace is registered under `tag`.
    pub fn resolve_namespace(
        &self,
        tag: &str,
        ctx: &dyn Context,
        functors: &mut FunctorCache,
    ) -> Result<Option<Arc<dyn Namespace>>> {
        if is_reserved_namespace(tag) && self.options.reserved == ReservedPolicy::Reject {
            warn!(tag, "reserved namespace rejected");
            return Err(ResolveError::ReservedNamespace {
                tag: tag.to_string(),
            });
        }
        if let Some(functor) = functors.get(tag) {
            return Ok(Some(functor));
        }
        let target = ctx
            .namespace_resolver()
            .and_then(|r| r.resolve_namespace(tag))
            .or_else(|| self.namespaces.get(tag));
        match target {
            Some(target) => functors.get_or_create(tag, target, ctx).map(Some),
            None => {
                debug!(tag, run = %functors.run(), "namespace undefined");
                Ok(None)
            }
        }
    }

    /// Start a top-level evaluation against `ctx`.
    pub fn begin(&self, ctx: Arc<dyn Context>) -> Run<'_> {
        let scope = ctx.thread_scoped().then(|| enter_thread_scope(Arc::clone(&ctx)));
        let functors = FunctorCache::new();
        debug!(run = %functors.run(), thread_scoped = scope.is_some(), "run started");
        Run {
            resolver: self,
            ctx,
            functors,
            scope,
        }
    }

    /// Run `f` as one evaluation; the run is torn down whether `f` fails or not.
    pub fn evaluate<R>(
        &self,
        ctx: Arc<dyn Context>,
        f: impl FnOnce(&mut Run<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut run = self.begin(ctx);
        f(&mut run)
    }
}

/// =========================
/// Run
/// =========================

/// One top-level evaluation: its context, functor cache and thread scope.
///
/// Dropping the run releases its functors and exits its thread scope.
pub struct Run<'r> {
    resolver: &'r Resolver,
    ctx: Arc<dyn Context>,
    functors: FunctorCache,
    scope: Option<ScopeHandle>,
}

impl Run<'_> {
    pub fn id(&self) -> RunId {
        self.functors.run()
    }

    pub fn context(&self) -> &Arc<dyn Context> {
        &self.ctx
    }

    pub fn is_thread_scoped(&self) -> bool {
        self.scope.is_some()
    }

    pub fn resolve(&self, name: &Name) -> Result<Binding> {
        self.resolver.resolve(name, self.ctx.as_ref())
    }

    /// Resolve and follow members through JSON values, honoring `strict`.
    pub fn resolve_value(&self, name: &Name) -> Result<Value> {
        let strict = self.resolver.options.strict;
        let binding = match self.resolve(name) {
            Ok(binding) => binding,
            Err(e) if !strict && e.is_recoverable() => return Ok(Value::Null),
            Err(e) => return Err(e),
        };
        match binding.navigate() {
            Ok(value) => Ok(value),
            Err(_) if !strict => Ok(Value::Null),
            Err(segment) => Err(ResolveError::UnresolvedProperty {
                name: name.to_string(),
                segment,
            }),
        }
    }

    pub fn resolve_namespace(&mut self, tag: &str) -> Result<Option<Arc<dyn Namespace>>> {
        self.resolver
            .resolve_namespace(tag, self.ctx.as_ref(), &mut self.functors)
    }

    /// Dispatch `tag:function(args)`.
    pub fn call(&mut self, tag: &str, function: &str, args: &[Value]) -> Result<Value> {
        let ns = self
            .resolve_namespace(tag)?
            .ok_or_else(|| ResolveError::UnknownNamespace {
                tag: tag.to_string(),
            })?;
        ns.call(function, args)
    }

    /// Like [`Run::call`] with the target written as `tag:function`.
    pub fn call_ref(&mut self, target: &str, args: &[Value]) -> Result<Value> {
        let (tag, function) = parser::parse_call_ref(target)?;
        self.call(&tag, &function, args)
    }

    pub fn finish(self) {}
}

impl Drop for Run<'_> {
    fn drop(&mut self) {
        debug!(run = %self.functors.run(), functors = self.functors.len(), "run finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapContext;
    use crate::functions::{functor_from, FunctionTable};
    use crate::thread_scope::{current_context, thread_scope_depth};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn name(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    #[test]
    fn full_key_wins_over_root() {
        let ctx = MapContext::new()
            .with_var("x", json!({"y": {"z": "member"}}))
            .with_var("x.y.z", json!("antish"));
        let r = Resolver::default();
        assert_eq!(
            r.resolve(&name("x.y.z"), &ctx).unwrap(),
            Binding::ContextVariable {
                key: "x.y.z".into(),
                value: json!("antish")
            }
        );
    }

    #[test]
    fn proper_prefix_yields_member_chain() {
        let ctx = MapContext::new().with_var("x", json!({"y": {"z": 1}}));
        let b = Resolver::default().resolve(&name("x.y.z"), &ctx).unwrap();
        assert_eq!(
            b,
            Binding::MemberChain {
                root_key: "x".into(),
                root: json!({"y": {"z": 1}}),
                remaining: vec!["y".into(), "z".into()],
            }
        );
    }

    #[test]
    fn longest_prefix_tie_break() {
        let ctx = MapContext::new()
            .with_var("a.b", json!(2))
            .with_var("a.b.c", json!(3));
        let b = Resolver::default().resolve(&name("a.b.c"), &ctx).unwrap();
        assert_eq!(b.value(), &json!(3));
        let b = Resolver::default().resolve(&name("a.b.c.d"), &ctx).unwrap();
        assert_eq!(b.value(), &json!(3));
        assert_eq!(b.remaining(), ["d".to_string()]);
    }

    #[test]
    fn null_binding_still_resolves() {
        let ctx = MapContext::new().with_var("n", Value::Null);
        let b = Resolver::default().resolve(&name("n"), &ctx).unwrap();
        assert!(b.is_context_variable());
        assert_eq!(b.value(), &Value::Null);
    }

    #[test]
    fn unresolved() {
        let ctx = MapContext::new().with_var("y", json!(1));
        let err = Resolver::default().resolve(&name("x.y"), &ctx).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedVariable { ref name } if name == "x.y"));
    }

    #[test]
    fn antish_disabled_only_probes_root() {
        let ctx = MapContext::new()
            .with_var("a.b", json!("antish"))
            .with_var("a", json!({"b": "member"}));
        let r = Resolver::new(ResolverOptions {
            antish: false,
            ..ResolverOptions::default()
        });
        let b = r.resolve(&name("a.b"), &ctx).unwrap();
        assert_eq!(b.navigate(), Ok(json!("member")));

        let only_antish = MapContext::new().with_var("a.b", json!(1));
        assert!(r.resolve(&name("a.b"), &only_antish).is_err());
    }

    #[test]
    fn reserved_variables_follow_policy() {
        let ctx = MapContext::new().with_var("$engine", json!(1));
        let strict = Resolver::default();
        for _ in 0..3 {
            assert!(matches!(
                strict.resolve(&name("$engine"), &ctx),
                Err(ResolveError::ReservedVariable { .. })
            ));
        }
        let permissive = Resolver::new(ResolverOptions {
            reserved: ReservedPolicy::Permit,
            ..ResolverOptions::default()
        });
        assert_eq!(
            permissive.resolve(&name("$engine"), &ctx).unwrap().value(),
            &json!(1)
        );
    }

    #[test]
    fn lenient_resolve_value_defaults_to_null() {
        let ctx: Arc<dyn Context> = Arc::new(MapContext::new().with_var("x", json!({"y": 1})));
        let lenient = Resolver::new(ResolverOptions {
            strict: false,
            ..ResolverOptions::default()
        });
        let run = lenient.begin(Arc::clone(&ctx));
        assert_eq!(run.resolve_value(&name("missing")).unwrap(), Value::Null);
        assert_eq!(run.resolve_value(&name("x.q")).unwrap(), Value::Null);
        assert_eq!(run.resolve_value(&name("x.y")).unwrap(), json!(1));
        drop(run);

        let strict = Resolver::default();
        let run = strict.begin(ctx);
        assert!(matches!(
            run.resolve_value(&name("x.q")),
            Err(ResolveError::UnresolvedProperty { ref segment, .. }) if segment == "q"
        ));
        assert!(matches!(
            run.resolve_value(&name("missing")),
            Err(ResolveError::UnresolvedVariable { .. })
        ));
    }

    #[test]
    fn options_from_json_fill_defaults() {
        let o = ResolverOptions::from_json(r#"{"strict": false, "reserved": "permit"}"#).unwrap();
        assert_eq!(
            o,
            ResolverOptions {
                antish: true,
                strict: false,
                reserved: ReservedPolicy::Permit
            }
        );
        assert!(matches!(
            ResolverOptions::from_json("{"),
            Err(ResolveError::Json(_))
        ));
    }

    #[test]
    fn context_namespaces_shadow_engine_namespaces() {
        let mut engine_ns = NamespaceMap::new();
        engine_ns.register("m", FunctionTable::new("m").with_fn("who", 0..=0, |_| Ok(json!("engine"))));
        let mut ctx_ns = NamespaceMap::new();
        ctx_ns.register("m", FunctionTable::new("m").with_fn("who", 0..=0, |_| Ok(json!("context"))));

        let r = Resolver::default().with_namespaces(engine_ns);
        let plain: Arc<dyn Context> = Arc::new(MapContext::new());
        assert_eq!(r.begin(plain).call("m", "who", &[]).unwrap(), json!("engine"));
        let shadowing: Arc<dyn Context> = Arc::new(MapContext::new().with_namespaces(ctx_ns));
        assert_eq!(r.begin(shadowing).call("m", "who", &[]).unwrap(), json!("context"));
    }

    #[test]
    fn functor_sees_run_context() {
        let mut r = Resolver::default();
        r.register_namespace(
            "greet",
            FunctionTable::new("greet").with_functor(functor_from(|ctx: &dyn Context| {
                let who = ctx.get("user").unwrap_or(Value::Null);
                Ok(FunctionTable::new("greet")
                    .with_fn("hello", 0..=0, move |_| Ok(json!(format!("hello {}", who.as_str().unwrap_or("?"))))))
            })),
        );
        let ctx: Arc<dyn Context> = Arc::new(MapContext::new().with_var("user", json!("ada")));
        let mut run = r.begin(ctx);
        assert_eq!(run.call_ref("greet:hello", &[]).unwrap(), json!("hello ada"));
        let a = run.resolve_namespace("greet").unwrap().unwrap();
        let b = run.resolve_namespace("greet").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_and_reserved_namespaces() {
        let r = Resolver::default();
        let ctx: Arc<dyn Context> = Arc::new(MapContext::new());
        let mut run = r.begin(ctx);
        assert!(run.resolve_namespace("nope").unwrap().is_none());
        assert!(matches!(
            run.call("nope", "f", &[]),
            Err(ResolveError::UnknownNamespace { .. })
        ));
        assert!(matches!(
            run.resolve_namespace("engine"),
            Err(ResolveError::ReservedNamespace { .. })
        ));
        assert!(matches!(
            run.call_ref("bad ref", &[]),
            Err(ResolveError::MalformedName(_))
        ));
    }

    #[test]
    fn run_binds_thread_scope_only_when_opted_in() {
        let r = Resolver::default();
        let plain: Arc<dyn Context> = Arc::new(MapContext::new());
        let run = r.begin(plain);
        assert!(!run.is_thread_scoped());
        assert!(current_context().is_none());
        run.finish();

        let scoped: Arc<dyn Context> = Arc::new(MapContext::new().with_thread_scope());
        let result: Result<()> = r.evaluate(Arc::clone(&scoped), |run| {
            assert!(run.is_thread_scoped());
            assert!(Arc::ptr_eq(&current_context().unwrap(), run.context()));
            run.resolve(&name("missing")).map(|_| ())
        });
        assert!(result.is_err());
        assert_eq!(thread_scope_depth(), 0);
    }
}
