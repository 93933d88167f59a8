//! Per-run cache of namespace functors.
//!
//! A run creates each namespace's functor at most once; the cache owns the
//! functors and releases them when the run ends.

use crate::context::Context;
use crate::errors::{ResolveError, Result};
use crate::namespace::Namespace;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    fn next() -> Self {
        RunId(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

pub struct FunctorCache {
    run: RunId,
    functors: HashMap<String, Arc<dyn Namespace>>,
}

impl FunctorCache {
    pub fn new() -> Self {
        Self {
            run: RunId::next(),
            functors: HashMap::new(),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn len(&self) -> usize {
        self.functors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functors.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.functors.contains_key(tag)
    }

    /// Functor already created for `tag` in this run.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Namespace>> {
        self.functors.get(tag).cloned()
    }

    /// The object to dispatch `tag:function` calls to for this run.
    ///
    /// Targets without a functor capability are returned as-is. Failed
    /// creations are not cached, so the next lookup of the tag tries again.
    pub fn get_or_create(
        &mut self,
        tag: &str,
        target: Arc<dyn Namespace>,
        ctx: &dyn Context,
    ) -> Result<Arc<dyn Namespace>> {
        if let Some(functor) = self.functors.get(tag) {
            return Ok(Arc::clone(functor));
        }
        let Some(factory) = target.functor() else {
            return Ok(target);
        };
        let functor = factory.create_functor(ctx).map_err(|e| {
            warn!(run = %self.run, tag, error = %e, "functor creation failed");
            ResolveError::NamespaceInitialization {
                tag: tag.to_string(),
                reason: e.to_string(),
            }
        })?;
        debug!(run = %self.run, tag, "functor created");
        self.functors.insert(tag.to_string(), Arc::clone(&functor));
        Ok(functor)
    }
}

impl Default for FunctorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FunctorCache {
    fn drop(&mut self) {
        if !self.functors.is_empty() {
            debug!(run = %self.run, released = self.functors.len(), "functors released");
        }
    }
}
