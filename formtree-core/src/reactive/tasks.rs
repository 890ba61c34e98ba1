//! Deferred Commands
//!
//! Mutations requested from outside a tick (notification handlers, loading
//! gate callbacks, host code holding only a queue handle) are queued here and
//! applied by the engine at the start of its next tick.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::graph::{DependencyId, FailureSet, FieldId, FormId};
use crate::value::FieldValue;

/// A mutation waiting for the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Capture the baseline of a change dependency.
    ///
    /// The engine applies captures before the next edit it performs, so the
    /// baseline is the value present when the command was queued.
    CaptureBaseline(DependencyId),
    /// Replace a field's model value.
    SetValue { field: FieldId, value: FieldValue },
    /// Replace a field's raw failure set.
    SetValidity { field: FieldId, failures: FailureSet },
    /// Mark a field as having lost focus.
    Blur(FieldId),
    /// Tear down a form and its subtree.
    DestroyForm(FormId),
    /// Tear down a single field.
    DestroyField(FieldId),
    /// Forget the shown error summary of a form (the user closed it).
    DismissSummary(FormId),
}

/// Shared FIFO of commands.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    queue: Arc<Mutex<VecDeque<Command>>>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command for the next tick.
    pub fn push(&self, command: Command) {
        trace!(?command, "command deferred");
        self.queue.lock().push_back(command);
    }

    /// Take every queued command, oldest first.
    pub fn drain(&self) -> Vec<Command> {
        self.queue.lock().drain(..).collect()
    }

    /// Take the queued baseline captures, leaving other commands in order.
    pub fn drain_captures(&self) -> Vec<DependencyId> {
        let mut captures = Vec::new();
        self.queue.lock().retain(|command| match command {
            Command::CaptureBaseline(dep) => {
                captures.push(*dep);
                false
            }
            _ => true,
        });
        captures
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_is_fifo_and_empties_the_queue() {
        let queue = TaskQueue::new();
        let field = FieldId::new();

        queue.push(Command::Blur(field));
        queue.push(Command::SetValue {
            field,
            value: FieldValue::from(1),
        });

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], Command::Blur(field));
        assert!(queue.is_empty());
    }

    #[test]
    fn captures_drain_separately() {
        let queue = TaskQueue::new();
        let field = FieldId::new();
        let first = DependencyId::new();
        let second = DependencyId::new();

        queue.push(Command::CaptureBaseline(first));
        queue.push(Command::Blur(field));
        queue.push(Command::CaptureBaseline(second));

        assert_eq!(queue.drain_captures(), vec![first, second]);
        assert_eq!(queue.drain(), vec![Command::Blur(field)]);
    }

    #[test]
    fn clones_share_the_queue() {
        let queue = TaskQueue::new();
        let handle = queue.clone();

        handle.push(Command::DismissSummary(FormId::new()));
        assert_eq!(queue.len(), 1);
    }
}
