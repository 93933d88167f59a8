//! Thread-scoped context binding.
//!
//! Contexts that opt in are pushed onto a per-thread stack for the duration of
//! a run so that functions invoked during evaluation can reach the caller's
//! context without it being passed explicitly. Nested runs stack; releasing a
//! handle removes only the entry that handle pushed.
//!
//! Holding on to the `Arc` returned by [`current_context`] past the end of the
//! run keeps the context alive; treat such references with care. Contexts
//! shared between threads need their own synchronization.

use crate::context::Context;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

struct ScopeEntry {
    id: u64,
    ctx: Arc<dyn Context>,
}

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ScopeEntry>> = const { RefCell::new(Vec::new()) };
    static NEXT_SCOPE_ID: Cell<u64> = const { Cell::new(0) };
}

/// Proof that a context was pushed on this thread; its entry is removed on drop.
///
/// Not `Send`: a scope must be released on the thread that entered it.
#[must_use = "dropping the handle immediately exits the thread scope"]
pub struct ScopeHandle {
    id: u64,
    depth: usize,
    _not_send: PhantomData<Rc<()>>,
}

impl ScopeHandle {
    /// Stack depth at the time this handle was entered.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        // Only this handle's entry goes; bindings pushed by live handles stay.
        let released = SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack
                .iter()
                .rposition(|entry| entry.id == self.id)
                .map(|pos| stack.remove(pos))
        });
        trace!(
            scope = self.id,
            depth = self.depth,
            released = released.is_some(),
            "thread scope exit"
        );
        // The context is dropped here, outside the borrow.
        drop(released);
    }
}

/// Bind `ctx` as the current context of this thread until the handle is released.
pub fn enter_thread_scope(ctx: Arc<dyn Context>) -> ScopeHandle {
    let id = NEXT_SCOPE_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    let depth = SCOPE_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(ScopeEntry { id, ctx });
        depth
    });
    trace!(scope = id, depth, "thread scope enter");
    ScopeHandle {
        id,
        depth,
        _not_send: PhantomData,
    }
}

pub fn exit_thread_scope(handle: ScopeHandle) {
    drop(handle);
}

/// The innermost context bound on this thread, if any.
pub fn current_context() -> Option<Arc<dyn Context>> {
    SCOPE_STACK.with(|stack| stack.borrow().last().map(|entry| Arc::clone(&entry.ctx)))
}

pub fn thread_scope_depth() -> usize {
    SCOPE_STACK.with(|stack| stack.borrow().len())
}

/// Run `f` with `ctx` bound; the binding is released even if `f` panics.
pub fn with_thread_scope<R>(ctx: Arc<dyn Context>, f: impl FnOnce() -> R) -> R {
    let _handle = enter_thread_scope(ctx);
    f()
}
