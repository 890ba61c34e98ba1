//! Recomputation Context
//!
//! Tracks which recomputation pass is running on the current thread. Every
//! change-flag or error-list recomputation runs inside a pass, and passes must
//! never nest: a second pass starting while one is active would observe a
//! half-updated graph. Handlers that want to mutate the tree send commands
//! through a [`TaskQueue`](super::TaskQueue) instead, and those are applied on
//! the next tick.

use std::cell::RefCell;

use tracing::warn;

use crate::graph::FormId;

thread_local! {
    static PASS_STACK: RefCell<Vec<PassEntry>> = const { RefCell::new(Vec::new()) };
}

/// What a pass is recomputing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Changed flags, walking root-ward.
    Changes,
    /// Error lists, walking root-ward.
    Errors,
}

#[derive(Debug, Clone, Copy)]
struct PassEntry {
    kind: PassKind,
    origin: FormId,
}

/// Guard that ends the pass when dropped.
///
/// The stack is maintained even if the recomputation panics.
pub struct RecomputeContext {
    kind: PassKind,
    origin: FormId,
}

impl RecomputeContext {
    /// Start a pass originating at `origin`.
    pub fn enter(kind: PassKind, origin: FormId) -> Self {
        PASS_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(active) = stack.last() {
                warn!(
                    active = ?active.kind,
                    active_origin = active.origin.raw(),
                    requested = ?kind,
                    "recomputation pass started while another is active"
                );
                debug_assert!(
                    stack.is_empty(),
                    "recomputation passes must not interleave"
                );
            }
            stack.push(PassEntry { kind, origin });
        });

        Self { kind, origin }
    }

    /// Check if a pass is running on this thread.
    pub fn is_active() -> bool {
        PASS_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the kind of the running pass, if any.
    pub fn current() -> Option<PassKind> {
        PASS_STACK.with(|stack| stack.borrow().last().map(|entry| entry.kind))
    }
}

impl Drop for RecomputeContext {
    fn drop(&mut self) {
        PASS_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    (entry.kind, entry.origin),
                    (self.kind, self.origin),
                    "RecomputeContext mismatch"
                );
            }
        });
    }
}
